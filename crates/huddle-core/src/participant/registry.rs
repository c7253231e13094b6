//! Participant kind registry.
//!
//! Maps kind names to factory closures, populated at startup and read-only
//! afterwards. Factories receive the descriptor arguments positionally and may
//! be synchronous (run inline) or asynchronous (awaited). A factory is free to
//! build a [`SubTeam`](crate::participant::SubTeam); nesting needs no special
//! handling here.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, info, instrument};

use crate::domain::error::{BoxError, HuddleError, Result};
use crate::participant::spec::ParticipantSpec;
use crate::participant::Participant;

type SyncFactory = Arc<dyn Fn(Vec<String>) -> std::result::Result<Participant, BoxError> + Send + Sync>;
type AsyncFactory =
    Arc<dyn Fn(Vec<String>) -> BoxFuture<'static, std::result::Result<Participant, BoxError>> + Send + Sync>;

#[derive(Clone)]
enum Factory {
    Sync(SyncFactory),
    Async(AsyncFactory),
}

/// Registry of participant factories keyed by kind name.
#[derive(Clone, Default)]
pub struct ParticipantRegistry {
    factories: HashMap<String, Factory>,
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a synchronous factory. Replaces any previous factory of the
    /// same name.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(Vec<String>) -> std::result::Result<Participant, BoxError> + Send + Sync + 'static,
    {
        self.factories
            .insert(kind.into(), Factory::Sync(Arc::new(factory)));
        self
    }

    /// Register an asynchronous factory.
    pub fn register_async<F, Fut>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(Vec<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Participant, BoxError>> + Send + 'static,
    {
        let boxed: AsyncFactory = Arc::new(move |args| factory(args).boxed());
        self.factories.insert(kind.into(), Factory::Async(boxed));
        self
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered kind names, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Parse `spec` and construct the participant it names.
    pub async fn resolve(&self, spec: &str) -> Result<Participant> {
        let parsed = ParticipantSpec::parse(spec)?;
        self.resolve_spec(&parsed).await
    }

    /// Construct the participant named by an already-parsed descriptor.
    #[instrument(skip(self), fields(kind = %spec.name))]
    pub async fn resolve_spec(&self, spec: &ParticipantSpec) -> Result<Participant> {
        let factory =
            self.factories
                .get(&spec.name)
                .ok_or_else(|| HuddleError::UnresolvedParticipant {
                    name: spec.name.clone(),
                })?;

        let created = match factory {
            Factory::Sync(f) => f(spec.args.clone()),
            Factory::Async(f) => f(spec.args.clone()).await,
        };

        let participant = created.map_err(|source| HuddleError::ParticipantFactory {
            name: spec.name.clone(),
            source,
        })?;

        if spec.args.is_empty() {
            info!(participant = %participant.name(), "created participant");
        } else {
            info!(
                participant = %participant.name(),
                args = ?spec.args,
                "created participant with args"
            );
        }
        Ok(participant)
    }

    /// Resolve a full participant list.
    ///
    /// Every descriptor is parsed and every kind looked up before any factory
    /// runs, so a bad entry aborts setup without constructing anything.
    pub async fn resolve_all<S: AsRef<str>>(&self, specs: &[S]) -> Result<Vec<Participant>> {
        let parsed = specs
            .iter()
            .map(|s| ParticipantSpec::parse(s.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        if let Some(unknown) = parsed.iter().find(|s| !self.contains(&s.name)) {
            return Err(HuddleError::UnresolvedParticipant {
                name: unknown.name.clone(),
            });
        }

        let mut participants = Vec::with_capacity(parsed.len());
        for spec in &parsed {
            participants.push(self.resolve_spec(spec).await?);
        }
        debug!(count = participants.len(), "resolved participants");
        Ok(participants)
    }
}

impl std::fmt::Debug for ParticipantRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticipantRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
