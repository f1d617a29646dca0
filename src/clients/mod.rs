pub mod controller_client;
pub mod crm_client;
pub mod http;

pub use controller_client::ControllerClient;
pub use crm_client::CrmClient;
pub use http::RawResponse;
