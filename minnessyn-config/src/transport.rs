//! Viewer transport parameters.
//!
//! The transport itself is a collaborator supplied by the host; these
//! settings only describe where it should listen for the viewer and how
//! long the blocking connection wait may take.

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TransportConfig {
    /// Address the host's transport listens on for the viewer.
    #[validate(length(min = 1, message = "listen address must not be empty"))]
    pub listen_addr: String,

    /// Upper bound for the blocking viewer wait, in seconds.
    #[validate(range(min = 1, max = 3600))]
    pub accept_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:9870".into(),
            accept_timeout_secs: 30,
        }
    }
}
