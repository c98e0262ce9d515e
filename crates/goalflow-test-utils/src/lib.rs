//! Scripted stand-ins for the external collaborators.
//!
//! Each mock records what it was asked so tests can assert on call order.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;

use futures::future::BoxFuture;

use goalflow_core::error::{GoalflowError, Result};
use goalflow_core::traits::{Generator, LookupBackend, ModelWriter};
use goalflow_core::types::SearchHit;

/// One scripted generator reply.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Empty,
    NetworkError(String),
    RemoteError(u16),
}

impl Reply {
    pub fn text(s: impl Into<String>) -> Self {
        Reply::Text(s.into())
    }

    fn into_result(self) -> Result<String> {
        match self {
            Reply::Text(t) => Ok(t),
            Reply::Empty => Err(GoalflowError::EmptyResponse),
            Reply::NetworkError(m) => Err(GoalflowError::Network(m)),
            Reply::RemoteError(status) => Err(GoalflowError::Remote {
                status,
                body: "scripted failure".into(),
            }),
        }
    }
}

/// A recorded generator call.
#[derive(Debug, Clone)]
pub struct GeneratorCall {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
}

/// Generator that plays back replies in order, then repeats the last one.
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Reply>>,
    last: Mutex<Reply>,
    calls: Mutex<Vec<GeneratorCall>>,
}

impl ScriptedGenerator {
    pub fn sequence(replies: Vec<Reply>) -> Self {
        let last = replies.last().cloned().unwrap_or(Reply::Empty);
        Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(last),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always(text: impl Into<String>) -> Self {
        Self::sequence(vec![Reply::text(text)])
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::sequence(vec![Reply::NetworkError(message.into())])
    }

    pub fn calls(&self) -> Vec<GeneratorCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Generator for ScriptedGenerator {
    fn generate<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
        temperature: f32,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(GeneratorCall {
                system_prompt: system_prompt.to_string(),
                user_prompt: user_prompt.to_string(),
                temperature,
            });
            let reply = match self.replies.lock().unwrap().pop_front() {
                Some(r) => r,
                None => self.last.lock().unwrap().clone(),
            };
            reply.into_result()
        })
    }
}

/// One scripted lookup outcome.
#[derive(Debug, Clone)]
pub enum LookupReply {
    Hits(Vec<SearchHit>),
    Fail(String),
}

/// Lookup backend that plays back outcomes in order, then repeats the last one.
pub struct ScriptedLookup {
    replies: Mutex<VecDeque<LookupReply>>,
    last: LookupReply,
    queries: Mutex<Vec<String>>,
}

impl ScriptedLookup {
    pub fn sequence(replies: Vec<LookupReply>) -> Self {
        let last = replies
            .last()
            .cloned()
            .unwrap_or(LookupReply::Hits(vec![]));
        Self {
            replies: Mutex::new(replies.into()),
            last,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn always(hits: Vec<SearchHit>) -> Self {
        Self::sequence(vec![LookupReply::Hits(hits)])
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::sequence(vec![LookupReply::Fail(message.into())])
    }

    /// Queries received so far, in order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

impl LookupBackend for ScriptedLookup {
    fn name(&self) -> &str {
        "scripted"
    }

    fn lookup<'a>(
        &'a self,
        query: &'a str,
        max_results: usize,
    ) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
        Box::pin(async move {
            self.queries.lock().unwrap().push(query.to_string());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.last.clone());
            match reply {
                LookupReply::Hits(mut hits) => {
                    hits.truncate(max_results);
                    Ok(hits)
                }
                LookupReply::Fail(message) => Err(GoalflowError::Backend {
                    backend: "scripted".into(),
                    message,
                }),
            }
        })
    }
}

/// Model writer that keeps files in memory under a virtual directory.
pub struct RecordingWriter {
    fail_with: Option<String>,
    written: Mutex<Vec<(String, String)>>,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self {
            fail_with: None,
            written: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            written: Mutex::new(Vec::new()),
        }
    }

    /// `(file name, content)` pairs persisted so far.
    pub fn written(&self) -> Vec<(String, String)> {
        self.written.lock().unwrap().clone()
    }
}

impl Default for RecordingWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelWriter for RecordingWriter {
    fn persist<'a>(
        &'a self,
        content: &'a str,
        suggested_name: &'a str,
    ) -> BoxFuture<'a, Result<PathBuf>> {
        Box::pin(async move {
            if let Some(message) = &self.fail_with {
                return Err(GoalflowError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    message.clone(),
                )));
            }
            self.written
                .lock()
                .unwrap()
                .push((suggested_name.to_string(), content.to_string()));
            Ok(PathBuf::from("/virtual/models").join(suggested_name))
        })
    }
}

/// A handful of plausible hits.
pub fn sample_hits(n: usize) -> Vec<SearchHit> {
    (1..=n)
        .map(|i| {
            SearchHit::new(
                format!("Result {}", i),
                format!("https://example.com/{}", i),
                format!("Snippet number {}", i),
            )
        })
        .collect()
}
