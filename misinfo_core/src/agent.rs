//! The minimal interface shared by every participant in a run.
//!
//! Users and countermeasures are both agents, but they are driven
//! differently: users react to deliveries, countermeasures react to the
//! clock. The engine ticks every agent through [`Agent::on_tick`] and
//! collects whatever broadcasts fall out.

use crate::config::CountermeasureKind;
use crate::countermeasure::{BroadcastRequest, CountermeasureController};
use crate::user::UserState;
use misinfo_env::{Tick, UserId};

/// Identity of an agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AgentId {
    User(UserId),
    Countermeasure(CountermeasureKind),
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentId::User(id) => write!(f, "user:{}", id),
            AgentId::Countermeasure(kind) => write!(f, "cm_{}", kind),
        }
    }
}

/// Shared agent interface.
pub trait Agent {
    fn identity(&self) -> AgentId;

    /// Advances the agent's own clock-driven state.
    fn on_tick(&mut self, tick: Tick) -> Vec<BroadcastRequest>;
}

impl Agent for UserState {
    fn identity(&self) -> AgentId {
        AgentId::User(self.user_id.clone())
    }

    /// Users are purely event-driven; ticking one changes nothing.
    fn on_tick(&mut self, _tick: Tick) -> Vec<BroadcastRequest> {
        Vec::new()
    }
}

impl Agent for CountermeasureController {
    fn identity(&self) -> AgentId {
        AgentId::Countermeasure(self.kind())
    }

    fn on_tick(&mut self, tick: Tick) -> Vec<BroadcastRequest> {
        self.advance(tick)
    }
}
