pub mod funding;
pub mod mint;
pub mod router;
pub mod runner;
pub mod scheduler;
pub mod swap;
pub mod task;

/// Normalized outcome of one on-chain action.
///
/// Every layer above can persist or report this without re-interpreting
/// the layers below; the shape never changes on the way up.
#[derive(Debug, Clone, Default)]
pub struct ActionResult {
    pub success: bool,
    pub tx_id: Option<String>,
    pub message: String,
    /// Signaled, not fatal: the router for this network is unknown and the
    /// caller should collect router details, then retry the same request.
    pub needs_router_info: bool,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>) -> ActionResult {
        ActionResult {
            success: true,
            message: message.into(),
            ..ActionResult::default()
        }
    }

    pub fn ok_with_tx(tx_id: impl Into<String>, message: impl Into<String>) -> ActionResult {
        ActionResult {
            success: true,
            tx_id: Some(tx_id.into()),
            message: message.into(),
            ..ActionResult::default()
        }
    }

    pub fn fail(message: impl Into<String>) -> ActionResult {
        ActionResult {
            success: false,
            message: message.into(),
            ..ActionResult::default()
        }
    }

    pub fn needs_router(message: impl Into<String>) -> ActionResult {
        ActionResult {
            success: false,
            needs_router_info: true,
            message: message.into(),
            ..ActionResult::default()
        }
    }
}
