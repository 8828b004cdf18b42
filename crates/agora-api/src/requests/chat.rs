//! Direct messages: sending, listing a conversation, and delivery receipts.

use serde_json::json;
use tracing::{debug, warn};

use agora_db::MessageListQuery;
use agora_types::events::GatewayEvent;
use agora_types::models::{Message, User};

use crate::db_request::{DbBinding, Model};
use crate::parameters::{Parameters, coerce_boolean};
use crate::request::{ApiRequest, Precondition, RequestContext, RequestError};
use crate::resource::Resource;
use crate::response::ApiResponse;
use crate::validation::FieldRule;

/// Persists a message's flags and tells the other side about it.
fn acknowledge(ctx: &RequestContext<'_>, user: &User, message: &Message) -> Result<(), RequestError> {
    ctx.db
        .save_message_flags(message.id, message.received, message.read)?;

    ctx.dispatcher.broadcast_to_others(
        ctx.guard.socket_id(),
        GatewayEvent::MessageReceived {
            message: message.shape(),
            by: user.username.clone(),
        },
    );
    Ok(())
}

/// Most message ids one receipt may acknowledge.
pub const MAX_RECEIPT_IDS: i64 = 1000;

/// Notifies that one or more messages were received, and optionally read,
/// by the authenticated recipient.
pub struct MessageReceivedNotifyRequest;

impl ApiRequest for MessageReceivedNotifyRequest {
    fn should_resolve(&self, ctx: &RequestContext<'_>) -> Precondition {
        ctx.guard.check().into()
    }

    fn rules(&self, _params: &Parameters) -> Vec<FieldRule> {
        vec![
            FieldRule::required_without("id", "ids").integer(),
            FieldRule::required_without("ids", "id").integer_array().max(MAX_RECEIPT_IDS),
            FieldRule::sometimes("read").boolean(),
        ]
    }

    fn do_resolve(
        &self,
        name: &str,
        params: &Parameters,
        ctx: &RequestContext<'_>,
    ) -> Result<ApiResponse, RequestError> {
        let Some(user) = ctx.guard.user() else {
            return Ok(ApiResponse::empty_failure(name));
        };

        let ids = params
            .integers("ids")
            .filter(|ids| !ids.is_empty())
            .unwrap_or_else(|| params.integer("id").into_iter().collect());
        let read = params.boolean("read").unwrap_or(false);

        let rows = ctx.db.get_messages_for_recipient(&ids, &user.username)?;
        if rows.is_empty() {
            return Ok(ApiResponse::empty_failure(name));
        }

        for row in rows {
            let mut message = Message::try_from(row)?;
            message.mark_received();
            if read {
                message.mark_read();
            }
            acknowledge(ctx, user, &message)?;
        }

        Ok(ApiResponse::empty_success(name))
    }
}

/// Order-based page of the caller's messages, optionally narrowed to one
/// correspondent. Unread messages addressed to the caller are marked read.
pub struct MessagesRequest {
    binding: DbBinding,
    per_page_default: u32,
}

impl Default for MessagesRequest {
    fn default() -> Self {
        Self {
            binding: DbBinding::new(Model::Message),
            per_page_default: 15,
        }
    }
}

impl MessagesRequest {
    fn on_results(
        &self,
        ctx: &RequestContext<'_>,
        user: &User,
        messages: &mut [Message],
    ) -> Result<(), RequestError> {
        for message in messages.iter_mut() {
            if !message.read && message.is_addressed_to(&user.username) {
                message.mark_read();
                acknowledge(ctx, user, message)?;
            }
        }
        Ok(())
    }
}

impl ApiRequest for MessagesRequest {
    fn should_resolve(&self, ctx: &RequestContext<'_>) -> Precondition {
        ctx.guard.check().into()
    }

    fn rules(&self, _params: &Parameters) -> Vec<FieldRule> {
        vec![
            FieldRule::sometimes("with").string().max(255),
            FieldRule::sometimes("page").integer().min(1),
            FieldRule::sometimes("per_page").integer().between(1, 100),
            FieldRule::sometimes("order").string().one_of(&["asc", "desc"]),
        ]
    }

    fn do_resolve(
        &self,
        name: &str,
        params: &Parameters,
        ctx: &RequestContext<'_>,
    ) -> Result<ApiResponse, RequestError> {
        let Some(user) = ctx.guard.user() else {
            return Ok(ApiResponse::empty_failure(name));
        };

        let mut received = None;
        let mut read = None;
        for (column, value) in self.binding.filters(params, &self.rules(params)) {
            let Some(flag) = coerce_boolean(&value) else {
                warn!("Ignoring non-boolean '{}' filter: {}", column, value);
                continue;
            };
            match column {
                "received" => received = Some(flag),
                "read" => read = Some(flag),
                _ => {}
            }
        }

        let page = params.integer("page").unwrap_or(1).clamp(1, u32::MAX as i64) as u32;
        let per_page = params
            .integer("per_page")
            .map_or(self.per_page_default, |n| n.clamp(1, 100) as u32);
        let order = params.string("order").unwrap_or("desc");
        let offset = (page as u64 - 1) * per_page as u64;

        let query = MessageListQuery {
            username: &user.username,
            with: params.string("with"),
            received,
            read,
            descending: order == "desc",
            limit: per_page,
            offset: offset.min(u32::MAX as u64) as u32,
        };

        let (rows, total) = ctx.db.list_messages(&query)?;
        let mut messages = rows
            .into_iter()
            .map(Message::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?;
        debug!("{} listed {} of {} messages", user.username, messages.len(), total);

        self.on_results(ctx, user, &mut messages)?;

        Ok(ApiResponse::success(
            name,
            json!({
                "items": self.binding.present_all(&messages)?,
                "page": page,
                "per_page": per_page,
                "order": order,
                "total": total,
            }),
        ))
    }
}

/// Sends a direct message to another user.
pub struct MessageSendRequest {
    binding: DbBinding,
}

impl Default for MessageSendRequest {
    fn default() -> Self {
        Self {
            binding: DbBinding::new(Model::Message),
        }
    }
}

impl ApiRequest for MessageSendRequest {
    fn should_resolve(&self, ctx: &RequestContext<'_>) -> Precondition {
        ctx.guard.check().into()
    }

    fn rules(&self, _params: &Parameters) -> Vec<FieldRule> {
        vec![
            FieldRule::required("to").string().max(255),
            FieldRule::required("body").string().min(1).max(10_000),
        ]
    }

    fn do_resolve(
        &self,
        name: &str,
        params: &Parameters,
        ctx: &RequestContext<'_>,
    ) -> Result<ApiResponse, RequestError> {
        let (Some(user), Some(to), Some(body)) = (ctx.guard.user(), params.string("to"), params.string("body"))
        else {
            return Ok(ApiResponse::empty_failure(name));
        };

        if ctx.db.get_user_by_username(to)?.is_none() {
            return Ok(ApiResponse::failure(name, json!("Unknown recipient.")));
        }

        let message = Message::try_from(ctx.db.insert_message(&user.username, to, body)?)?;

        ctx.dispatcher.broadcast_to_others(
            ctx.guard.socket_id(),
            GatewayEvent::MessageSent {
                message: message.shape(),
                by: user.username.clone(),
            },
        );

        Ok(ApiResponse::success(name, self.binding.present(&message)?))
    }
}
