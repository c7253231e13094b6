//! Teams participating as a single speaker.
//!
//! A [`SubTeam`] owns a complete [`Team`] and answers a turn by running a
//! nested conversation. The parent loop sees only the aggregate reply; the
//! nested turns stay internal.

use tracing::{debug, instrument};

use crate::coordinator::Team;
use crate::domain::error::BoxError;
use crate::domain::message::Message;
use crate::domain::state::RunStatus;
use crate::participant::{Response, TurnContext};

#[derive(Debug, Clone)]
pub struct SubTeam {
    name: String,
    description: String,
    team: Team,
}

impl SubTeam {
    pub fn new(name: impl Into<String>, description: impl Into<String>, team: Team) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            team,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn team(&self) -> &Team {
        &self.team
    }

    /// Run the nested conversation on the latest message (or the parent task
    /// when nothing has been said yet).
    ///
    /// The nested run uses a child of the parent's cancellation token.
    #[instrument(skip(self, ctx), fields(team = %self.name))]
    pub async fn respond(&self, ctx: &TurnContext<'_>) -> Result<Response, BoxError> {
        let nested_task = ctx
            .history
            .last()
            .map(|m| m.text_content().into_owned())
            .unwrap_or_else(|| ctx.task.to_string());

        let result = self
            .team
            .run_stream_with_cancel(nested_task, ctx.cancel.child_token())
            .into_result()
            .await?;

        debug!(
            status = %result.status,
            turns = result.turn_count,
            "nested conversation finished"
        );

        match result.status {
            RunStatus::Completed => {
                let content = result
                    .last_message()
                    .map(|m| m.text_content().into_owned())
                    .unwrap_or_else(|| result.stop_reason.clone());
                Ok(Response::new(Message::text(self.name.clone(), content)))
            }
            RunStatus::Failed => Err(result
                .failure
                .map(|f| f.to_string())
                .unwrap_or(result.stop_reason)
                .into()),
            other => Err(format!("nested conversation ended as {other}").into()),
        }
    }
}
