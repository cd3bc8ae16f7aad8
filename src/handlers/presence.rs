//! Client-set presence status.

use super::Context;
use crate::error::{HandlerError, HandlerResult};
use hub_proto::PresenceUpdate;

pub async fn handle(ctx: &Context<'_>, update: PresenceUpdate) -> HandlerResult {
    if !update.status.is_client_settable() {
        return Err(HandlerError::InvalidStatus(update.status.as_str().to_string()));
    }
    ctx.hub.set_status(ctx.user_id(), update.status).await;
    Ok(())
}
