//! Consumer group ids. Each logical consumer has its own group, so every
//! consumer of a shared topic sees every message.

/// Catalog: answers `check-product-exists`.
pub const PRODUCT_SERVICE_GROUP: &str = "product-service-group";

/// Cart: reads `product-exists-response`.
pub const CART_SERVICE_RESPONSE_CONSUMER: &str = "cart-service-response-consumer";

/// Cart: reads `user-events`.
pub const CART_SERVICE: &str = "cart-service";

/// Invoice: reads checkouts from `cart-events`.
pub const INVOICE_SERVICE: &str = "invoice-service";

/// Catalog: reads product requests from `cart-events`.
pub const PRODUCT_SERVICE: &str = "product-service";

/// Cart: reads `product-response`.
pub const CART_PRODUCT_RESPONSE: &str = "cart-product-response";
