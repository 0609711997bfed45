//! Scripted fetcher for unit tests

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::fetcher::{Credential, RemoteResourceFetcher};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: &'static str,
    pub url: String,
    pub credential: Credential,
    pub form: Vec<(String, String)>,
}

/// Answers each URL from a queue of scripted bodies.
///
/// Queued bodies are consumed in order; the last one keeps answering once the
/// queue is down to a single entry. Unscripted URLs answer `None`.
#[derive(Default)]
pub struct FakeFetcher {
    responses: Mutex<HashMap<String, VecDeque<Option<String>>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: impl Into<String>, body: impl Into<String>) {
        self.respond_sequence(url, vec![Some(body.into())]);
    }

    pub fn respond_sequence(&self, url: impl Into<String>, bodies: Vec<Option<String>>) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.into(), bodies.into_iter().collect());
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.url == url)
            .count()
    }

    fn answer(&self, call: RecordedCall) -> Option<String> {
        let url = call.url.clone();
        self.calls.lock().unwrap().push(call);

        let mut responses = self.responses.lock().unwrap();
        let queue = responses.get_mut(&url)?;
        if queue.len() > 1 {
            queue.pop_front().flatten()
        } else {
            queue.front().cloned().flatten()
        }
    }
}

#[async_trait]
impl RemoteResourceFetcher for FakeFetcher {
    async fn get(&self, url: &str, credential: &Credential) -> Option<String> {
        self.answer(RecordedCall {
            method: "GET",
            url: url.to_string(),
            credential: credential.clone(),
            form: Vec::new(),
        })
    }

    async fn post_form(
        &self,
        url: &str,
        credential: &Credential,
        form: &[(&str, &str)],
    ) -> Option<String> {
        self.answer(RecordedCall {
            method: "POST",
            url: url.to_string(),
            credential: credential.clone(),
            form: form
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        })
    }
}
