//! Transport handlers and handler resolution.

use std::sync::OnceLock;

use crate::base::error::ClientError;
use crate::client::options::Options;
use crate::message::{Request, Response};

#[cfg(feature = "hyper-handler")]
pub mod hyper;
pub mod proxy;
pub mod socket;
pub mod transport;

/// An available transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    #[cfg(feature = "hyper-handler")]
    Hyper,
    Socket,
}

impl Handler {
    pub fn name(&self) -> &'static str {
        match self {
            #[cfg(feature = "hyper-handler")]
            Handler::Hyper => "hyper",
            Handler::Socket => "socket",
        }
    }

    /// Dispatch one request through this transport.
    pub async fn send(
        &self,
        request: &mut Request,
        options: &Options,
    ) -> Result<Response, ClientError> {
        match self {
            #[cfg(feature = "hyper-handler")]
            Handler::Hyper => hyper::HyperHandler::send(request, options).await,
            Handler::Socket => socket::SocketHandler::send(request, options).await,
        }
    }
}

/// How the engine picks a transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HandlerChoice {
    /// First available transport, probed once per process.
    #[default]
    Auto,
    /// A transport by name, failing when it is not built in.
    Named(String),
    Explicit(Handler),
}

/// Which transports this build carries.
#[derive(Debug, Clone, Copy)]
struct Capabilities {
    hyper: bool,
    socket: bool,
}

fn capabilities() -> &'static Capabilities {
    static CAPS: OnceLock<Capabilities> = OnceLock::new();
    CAPS.get_or_init(|| Capabilities {
        hyper: cfg!(feature = "hyper-handler"),
        socket: true,
    })
}

/// Resolve a choice to a concrete handler. Preference order for `Auto`
/// is hyper first, then the raw socket.
pub fn resolve(choice: &HandlerChoice) -> Result<Handler, ClientError> {
    let caps = capabilities();
    match choice {
        HandlerChoice::Explicit(handler) => Ok(*handler),
        HandlerChoice::Named(name) => match name.as_str() {
            #[cfg(feature = "hyper-handler")]
            "hyper" if caps.hyper => Ok(Handler::Hyper),
            "socket" if caps.socket => Ok(Handler::Socket),
            _ => Err(ClientError::HandlerUnavailable(name.clone())),
        },
        HandlerChoice::Auto => {
            #[cfg(feature = "hyper-handler")]
            if caps.hyper {
                return Ok(Handler::Hyper);
            }
            if caps.socket {
                return Ok(Handler::Socket);
            }
            Err(ClientError::NoHandlerAvailable)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_prefers_hyper_when_built() {
        let handler = resolve(&HandlerChoice::Auto).unwrap();
        #[cfg(feature = "hyper-handler")]
        assert_eq!(handler, Handler::Hyper);
        #[cfg(not(feature = "hyper-handler"))]
        assert_eq!(handler, Handler::Socket);
    }

    #[test]
    fn test_named_socket_always_available() {
        assert_eq!(
            resolve(&HandlerChoice::Named("socket".into())).unwrap(),
            Handler::Socket
        );
    }

    #[test]
    fn test_unknown_name_rejected() {
        let err = resolve(&HandlerChoice::Named("curl".into())).unwrap_err();
        assert!(matches!(err, ClientError::HandlerUnavailable(n) if n == "curl"));
    }
}
