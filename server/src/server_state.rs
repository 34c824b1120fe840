use std::sync::Arc;

use omw_session::notify::SmsGateway;

pub struct ServerState {
    // Outbound SMS provider used by the send-sms endpoint.
    pub gateway: Arc<dyn SmsGateway>,
}

impl ServerState {
    pub fn new(gateway: Arc<dyn SmsGateway>) -> Self {
        Self { gateway }
    }
}
