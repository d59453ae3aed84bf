use std::time::Instant;

use tracing::info;

use super::{Middleware, Next};
use crate::context::Context;
use crate::response::HandlerResult;

/// Logs one line per request on the way in and one on the way out.
///
/// ```text
/// --> GET /users/1
/// <-- GET /users/1 200 3ms
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct Logger;

impl Middleware for Logger {
    fn handle(&self, ctx: &mut Context, next: Next<'_>) -> HandlerResult {
        let method = ctx.req.method().clone();
        let path = ctx.req.path().to_string();
        let request_id = ctx.request_id();

        info!(request_id = %request_id, method = %method, path = %path, "-->");

        let start = Instant::now();
        let result = next.run(ctx);
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(res) => info!(
                request_id = %request_id,
                method = %method,
                path = %path,
                status = res.status,
                elapsed_ms = elapsed_ms,
                "<--"
            ),
            Err(err) => info!(
                request_id = %request_id,
                method = %method,
                path = %path,
                status = err.status(),
                error = %err,
                elapsed_ms = elapsed_ms,
                "<--"
            ),
        }

        result
    }
}
