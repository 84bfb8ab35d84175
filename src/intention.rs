//! Mindful intentions: the remote source, the local fallbacks and the board
//! that decides which reply gets shown.

use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::IntentionConfig;
use crate::runtime::BellEvent;

pub const FALLBACK_INTENTIONS: &[&str] = &[
    "Breathe in calm, breathe out tension",
    "Notice the weight of your body resting",
    "Let this breath be enough",
    "Soften your shoulders and your jaw",
    "Return gently, without judgment",
    "Feel your feet on the ground",
    "Listen to the sounds around you",
    "Meet this moment with kindness",
    "Let thoughts pass like clouds",
    "Rest your attention on the breath",
];

const SYSTEM_PROMPT: &str = "You write a single short mindful intention for someone in the middle \
of a meditation session. Reply with one sentence of at most twelve words and nothing else.";
const USER_PROMPT: &str = "Offer a mindful intention for this moment.";

const QUOTES: &[char] = &['"', '\'', '“', '”', '‘', '’', '`'];

#[derive(Debug, Error)]
pub enum IntentionError {
    #[error("no intention endpoint configured")]
    NotConfigured,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service answered with HTTP {0}")]
    Status(u16),
    #[error("unexpected response: {0}")]
    Malformed(String),
}

/// Produces intention text. Implementations may block; they are only ever
/// called off the UI thread.
pub trait IntentionSource: Send + Sync {
    fn fetch(&self) -> Result<String, IntentionError>;
}

/// Strip surrounding quotes and one trailing sentence mark. `None` if nothing is left.
pub fn sanitize(raw: &str) -> Option<String> {
    let text = raw.trim().trim_matches(QUOTES).trim();
    let text = text.strip_suffix(['.', '!', '?']).unwrap_or(text).trim_end();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

pub fn fallback_intention<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    FALLBACK_INTENTIONS
        .choose(rng)
        .copied()
        .unwrap_or("Breathe")
}

/// Always fails, so every intention comes from the fallback list
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineIntentions;

impl IntentionSource for OfflineIntentions {
    fn fetch(&self) -> Result<String, IntentionError> {
        Err(IntentionError::NotConfigured)
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// OpenAI-compatible chat-completions client
#[derive(Debug)]
pub struct HttpIntentionSource {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpIntentionSource {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, IntentionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key,
        })
    }

    /// The configured source, or the offline one when no endpoint is set.
    /// The API key is read from the environment variable the config names.
    pub fn from_config(cfg: &IntentionConfig) -> Arc<dyn IntentionSource> {
        let Some(endpoint) = cfg.endpoint.as_deref().filter(|e| !e.trim().is_empty()) else {
            return Arc::new(OfflineIntentions);
        };
        let api_key = std::env::var(&cfg.api_key_env)
            .ok()
            .filter(|k| !k.is_empty());
        match Self::new(
            endpoint,
            cfg.model.clone(),
            api_key,
            Duration::from_secs(cfg.timeout_secs),
        ) {
            Ok(source) => Arc::new(source),
            Err(err) => {
                tracing::warn!(error = %err, "intention client unavailable, using fallbacks");
                Arc::new(OfflineIntentions)
            }
        }
    }
}

impl IntentionSource for HttpIntentionSource {
    fn fetch(&self) -> Result<String, IntentionError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: USER_PROMPT,
                },
            ],
            max_tokens: 40,
            temperature: 0.9,
        };

        let mut req = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send()?;

        let status = resp.status();
        if !status.is_success() {
            return Err(IntentionError::Status(status.as_u16()));
        }

        let parsed: ChatResponse = resp
            .json()
            .map_err(|e| IntentionError::Malformed(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| IntentionError::Malformed("no choices in response".into()))?;

        sanitize(&content).ok_or_else(|| IntentionError::Malformed("empty intention".into()))
    }
}

/// Identifies one intention request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub generation: u64,
    pub id: u64,
}

#[derive(Debug)]
pub struct IntentionReply {
    pub ticket: Ticket,
    pub result: Result<String, IntentionError>,
}

/// What the running screen shows as the current intention.
///
/// The most recently issued request wins: replies to older tickets are
/// dropped even if they arrive last, and a failed latest request is replaced
/// by a fallback phrase. Replies for a session that has been stopped or has
/// finished are ignored.
#[derive(Debug, Default)]
pub struct IntentionBoard {
    text: Option<String>,
    generation: u64,
    latest: u64,
    pending: bool,
    open: bool,
}

impl IntentionBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_session(&mut self) {
        self.generation += 1;
        self.open = true;
        self.pending = false;
        self.text = None;
    }

    pub fn issue(&mut self) -> Ticket {
        self.latest += 1;
        self.pending = true;
        Ticket {
            generation: self.generation,
            id: self.latest,
        }
    }

    /// Returns true if the reply changed the display
    pub fn apply<R: Rng + ?Sized>(&mut self, reply: IntentionReply, rng: &mut R) -> bool {
        let IntentionReply { ticket, result } = reply;
        if !self.open || ticket.generation != self.generation || ticket.id != self.latest {
            tracing::debug!(ticket = ticket.id, latest = self.latest, "dropping stale intention");
            return false;
        }

        let text = match result {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(error = %err, "intention fetch failed, using fallback");
                fallback_intention(rng).to_string()
            }
        };
        tracing::debug!(ticket = ticket.id, %text, "intention updated");
        self.text = Some(text);
        self.pending = false;
        true
    }

    /// Session finished: keep the text, ignore anything still in flight
    pub fn close(&mut self) {
        self.open = false;
        self.pending = false;
    }

    /// Session stopped: clear the display and ignore anything in flight
    pub fn reset(&mut self) {
        self.generation += 1;
        self.open = false;
        self.pending = false;
        self.text = None;
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.pending
    }
}

/// Runs each fetch on its own thread and posts the reply to the event loop
#[derive(Clone)]
pub struct IntentionFetcher {
    source: Arc<dyn IntentionSource>,
    tx: Sender<BellEvent>,
}

impl IntentionFetcher {
    pub fn new(source: Arc<dyn IntentionSource>, tx: Sender<BellEvent>) -> Self {
        Self { source, tx }
    }

    pub fn fetch(&self, ticket: Ticket) {
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let result = source.fetch();
            // the loop may already be gone when the app is quitting
            let _ = tx.send(BellEvent::Intention(IntentionReply { ticket, result }));
        });
    }
}
