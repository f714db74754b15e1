//! Session provider seam.
//!
//! [`Connector`] opens an authenticated session for a
//! [`ConnectionProfile`](crate::classify::ConnectionProfile); the returned
//! [`Driver`] runs one command at a time. The engine, runner and discovery
//! code only ever see these traits, so tests swap in scripted sessions.

mod generic;
mod response;

pub use generic::{GenericDriver, SshConnector};
pub use response::{ParsedResponse, Response};

use std::future::Future;

use crate::classify::ConnectionProfile;
use crate::error::Result;
use crate::parse;
use crate::platform::DeviceType;

/// An open session to one device.
pub trait Driver: Send {
    /// Send a command and wait for the prompt.
    fn send_command(&mut self, command: &str) -> impl Future<Output = Result<Response>> + Send;

    /// Send a command and run its output through the template index.
    fn send_command_parsed(
        &mut self,
        command: &str,
    ) -> impl Future<Output = Result<ParsedResponse>> + Send {
        async move {
            let response = self.send_command(command).await?;
            let records = parse::parse_output(self.device_type(), command, &response.result)?;
            Ok(ParsedResponse { response, records })
        }
    }

    /// Device type the session was opened as.
    fn device_type(&self) -> DeviceType;

    /// Check if the underlying session is still alive.
    fn is_alive(&self) -> bool;

    /// Close the session.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Opens sessions.
pub trait Connector: Send + Sync {
    type Driver: Driver + 'static;

    fn connect(
        &self,
        profile: &ConnectionProfile,
    ) -> impl Future<Output = Result<Self::Driver>> + Send;
}
