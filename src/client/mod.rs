pub mod models;
pub mod panel;

pub use models::{
    Allocation, Container, Egg, EggVariable, FeatureLimits, Limits, Node, Pagination, Server,
    User,
};
pub use panel::{
    list_all, ApiRequest, ApiResponse, HttpMethod, ListError, PanelApi, PanelClient, MODULE_LOG,
};

#[cfg(test)]
pub use panel::mock;
