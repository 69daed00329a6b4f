//! Process-wide entry point for pushes delivered while no screen is active.
//!
//! The platform calls `deliver` outside any screen lifecycle, so the
//! installed handler gets a fresh backend connection on every delivery
//! instead of borrowing one from a screen.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::usecases::{
    contracts::{BackendError, RawPush},
    push_channel::ChannelError,
};

const BACKGROUND_HANDLER_INSTALLED: &str = "BACKGROUND_HANDLER_INSTALLED";
const BACKGROUND_HANDLER_REMOVED: &str = "BACKGROUND_HANDLER_REMOVED";
const BACKGROUND_EVENT_DROPPED: &str = "BACKGROUND_EVENT_DROPPED";
const BACKGROUND_CONNECT_FAILED: &str = "BACKGROUND_CONNECT_FAILED";

pub trait BackgroundHandler {
    fn handle(&mut self, push: RawPush);
}

type Connector = Arc<dyn Fn() -> Result<Box<dyn BackgroundHandler>, BackendError> + Send + Sync>;

static BACKGROUND_ENTRY: Mutex<Option<Connector>> = Mutex::new(None);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundDelivery {
    Handled,
    NotInstalled,
    ConnectFailed,
}

/// Keeps the background handler installed; dropping it uninstalls.
#[derive(Debug)]
#[must_use = "dropping the guard uninstalls the background handler"]
pub struct BackgroundHandlerGuard {
    _private: (),
}

impl Drop for BackgroundHandlerGuard {
    fn drop(&mut self) {
        entry().take();
        tracing::debug!(code = BACKGROUND_HANDLER_REMOVED, "background handler removed");
    }
}

/// Installs `connect` as the process-wide handler factory. Only one may be
/// installed at a time.
pub fn install<F>(connect: F) -> Result<BackgroundHandlerGuard, ChannelError>
where
    F: Fn() -> Result<Box<dyn BackgroundHandler>, BackendError> + Send + Sync + 'static,
{
    let mut entry = entry();

    if entry.is_some() {
        return Err(ChannelError::AlreadyActive);
    }

    *entry = Some(Arc::new(connect));
    tracing::debug!(code = BACKGROUND_HANDLER_INSTALLED, "background handler installed");

    Ok(BackgroundHandlerGuard { _private: () })
}

fn entry() -> MutexGuard<'static, Option<Connector>> {
    BACKGROUND_ENTRY
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Runs the installed handler outside the entry lock, so a handler that
/// writes back through the platform can trigger further deliveries.
pub fn deliver(push: RawPush) -> BackgroundDelivery {
    let installed = entry().as_ref().map(Arc::clone);
    let Some(connect) = installed else {
        tracing::debug!(
            code = BACKGROUND_EVENT_DROPPED,
            "background push dropped; no handler installed"
        );
        return BackgroundDelivery::NotInstalled;
    };

    match connect() {
        Ok(mut handler) => {
            handler.handle(push);
            BackgroundDelivery::Handled
        }
        Err(error) => {
            tracing::warn!(
                code = BACKGROUND_CONNECT_FAILED,
                error = %error,
                "background handler could not connect"
            );
            BackgroundDelivery::ConnectFailed
        }
    }
}
