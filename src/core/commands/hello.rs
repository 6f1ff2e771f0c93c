// src/core/commands/hello.rs

//! Implements `HELLO`, which names the client and negotiates features.

use super::{ExecutableCommand, ExecutionContext, ParseCommand};
use crate::core::SubdocError;
use crate::core::protocol::hello::{decode_feature_codes, encode_feature_codes};
use crate::core::protocol::{Features, Reply, Request};
use async_trait::async_trait;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hello {
    pub agent: Option<String>,
    /// Feature codes requested by the client, including ones this server
    /// does not know.
    pub requested: Vec<u16>,
}

impl ParseCommand for Hello {
    fn parse(request: &Request) -> Result<Self, SubdocError> {
        if !request.extras.is_empty() {
            return Err(SubdocError::InvalidArguments("HELLO takes no extras"));
        }
        if request.value.len() % 2 != 0 {
            return Err(SubdocError::InvalidArguments("HELLO body must be a list of u16 codes"));
        }
        let agent = (!request.key.is_empty())
            .then(|| String::from_utf8_lossy(&request.key).into_owned());
        Ok(Hello {
            agent,
            requested: decode_feature_codes(&request.value),
        })
    }
}

#[async_trait]
impl ExecutableCommand for Hello {
    async fn execute(&self, ctx: &mut ExecutionContext<'_>) -> Result<Reply, SubdocError> {
        let features = self
            .requested
            .iter()
            .filter_map(|code| Features::from_code(*code))
            .fold(Features::empty(), |acc, f| acc | f);

        info!(
            "Session {}: HELLO from {:?}, enabled features {:?}",
            ctx.session.session_id,
            self.agent.as_deref().unwrap_or("<anonymous>"),
            features
        );
        ctx.session.features = features;
        ctx.session.agent = self.agent.clone();

        Ok(Reply::success().value(encode_feature_codes(&features.codes())))
    }
}
