//! Topic names shared by all services.

/// Readiness pings published at startup. Nobody consumes it.
pub const HEALTH_CHECK: &str = "health-check";

/// Product-existence queries published by the cart service.
pub const CHECK_PRODUCT_EXISTS: &str = "check-product-exists";

/// Product-existence answers published by the catalog service.
pub const PRODUCT_EXISTS_RESPONSE: &str = "product-exists-response";

/// User lifecycle events (successful logins).
pub const USER_EVENTS: &str = "user-events";

/// Cart events: checkouts and product detail requests share this topic.
pub const CART_EVENTS: &str = "cart-events";

/// Product detail answers keyed by request id.
pub const PRODUCT_RESPONSE: &str = "product-response";

/// Payload of a readiness ping.
pub const HEALTH_CHECK_PING: &str = "ping";
