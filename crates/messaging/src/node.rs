//! Assembly of a service node: which roles it plays, which consumers it runs.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use broker::{Broker, Publisher};
use common::ProductId;
use contracts::groups;
use domain::{CartRepository, InvoiceRepository, ProductLookup, UserDirectory};
use tokio_util::sync::CancellationToken;

use crate::consumer::{DEFAULT_RETRY_DELAY, EventHandler, TopicConsumer};
use crate::correlator::Correlator;
use crate::existence::{
    CorrelatedExistence, DEFAULT_EXISTENCE_TIMEOUT, DirectLookupExistence, ExistenceMode,
    ProductExistence,
};
use crate::handlers::{
    CartCheckedOutHandler, CheckProductExistsHandler, ProductExistsResponseHandler,
    ProductRequestedHandler, ProductResponseHandler, UserLoggedHandler,
};
use crate::producer::EventProducer;
use crate::readiness::{ReadinessProbe, RetryPolicy};
use crate::runtime::{ConsumerRuntime, ConsumerStatuses};
use crate::services::{CartService, InvoiceService, LoginService};

/// A service a node can host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ServiceRole {
    Cart,
    Catalog,
    Invoice,
    User,
}

impl ServiceRole {
    pub const ALL: [ServiceRole; 4] = [
        ServiceRole::Cart,
        ServiceRole::Catalog,
        ServiceRole::Invoice,
        ServiceRole::User,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceRole::Cart => "cart",
            ServiceRole::Catalog => "catalog",
            ServiceRole::Invoice => "invoice",
            ServiceRole::User => "user",
        }
    }

    /// Parses a comma-separated role list such as `cart,invoice`.
    pub fn parse_list(list: &str) -> Result<BTreeSet<ServiceRole>, String> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl FromStr for ServiceRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cart" => Ok(ServiceRole::Cart),
            "catalog" | "product" => Ok(ServiceRole::Catalog),
            "invoice" => Ok(ServiceRole::Invoice),
            "user" => Ok(ServiceRole::User),
            other => Err(format!("unknown service role: {other}")),
        }
    }
}

impl std::fmt::Display for ServiceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a node is wired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub roles: BTreeSet<ServiceRole>,
    pub existence: ExistenceMode,
    pub existence_timeout: Duration,
    pub probe: RetryPolicy,
    pub retry_delay: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            roles: ServiceRole::ALL.into_iter().collect(),
            existence: ExistenceMode::default(),
            existence_timeout: DEFAULT_EXISTENCE_TIMEOUT,
            probe: RetryPolicy::default(),
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Storage and lookup services a node works against.
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn ProductLookup>,
    pub carts: Arc<dyn CartRepository>,
    pub invoices: Arc<dyn InvoiceRepository>,
    pub users: Arc<dyn UserDirectory>,
}

/// A running node: request-side services for its roles plus their consumers.
pub struct Node {
    cart: Option<CartService>,
    login: Option<LoginService>,
    invoices: Option<InvoiceService>,
    correlator: Correlator<ProductId>,
    runtime: ConsumerRuntime,
}

struct Wiring {
    broker: Arc<dyn Broker>,
    probe: ReadinessProbe,
    retry_delay: Duration,
}

impl Wiring {
    fn consumer<E, H>(&self, group_id: &str, handler: H) -> TopicConsumer<E, H>
    where
        E: contracts::Event,
        H: EventHandler<E>,
    {
        TopicConsumer::new(group_id, Arc::clone(&self.broker), handler, self.probe.clone())
            .with_retry_delay(self.retry_delay)
    }
}

impl Node {
    /// Builds the services for the configured roles and spawns their
    /// consumers. Must be called from within a tokio runtime.
    #[tracing::instrument(skip_all, fields(roles = ?config.roles, existence = ?config.existence))]
    pub fn start<B>(
        broker: Arc<B>,
        collaborators: Collaborators,
        config: &NodeConfig,
        cancel: CancellationToken,
    ) -> Self
    where
        B: Broker + 'static,
    {
        let publisher: Arc<dyn Publisher> = broker.clone();
        let wiring = Wiring {
            broker,
            probe: ReadinessProbe::new(Arc::clone(&publisher), config.probe),
            retry_delay: config.retry_delay,
        };
        let producer = EventProducer::new(publisher);
        let correlator = Correlator::new();
        let mut runtime = ConsumerRuntime::new(cancel);
        let has = |role| config.roles.contains(&role);

        let cart = has(ServiceRole::Cart).then(|| {
            let existence: Arc<dyn ProductExistence> = match config.existence {
                ExistenceMode::Direct => Arc::new(DirectLookupExistence::new(Arc::clone(
                    &collaborators.catalog,
                ))),
                ExistenceMode::Correlated => Arc::new(CorrelatedExistence::new(
                    correlator.clone(),
                    producer.clone(),
                    config.existence_timeout,
                )),
            };
            let service = CartService::new(
                Arc::clone(&collaborators.carts),
                existence,
                producer.clone(),
            );

            runtime.spawn(wiring.consumer(
                groups::CART_SERVICE_RESPONSE_CONSUMER,
                ProductExistsResponseHandler::new(correlator.clone()),
            ));
            runtime.spawn(wiring.consumer(
                groups::CART_SERVICE,
                UserLoggedHandler::new(service.clone()),
            ));
            runtime.spawn(wiring.consumer(
                groups::CART_PRODUCT_RESPONSE,
                ProductResponseHandler::new(Arc::clone(&collaborators.carts)),
            ));
            service
        });

        if has(ServiceRole::Catalog) {
            runtime.spawn(wiring.consumer(
                groups::PRODUCT_SERVICE_GROUP,
                CheckProductExistsHandler::new(Arc::clone(&collaborators.catalog), producer.clone()),
            ));
            runtime.spawn(wiring.consumer(
                groups::PRODUCT_SERVICE,
                ProductRequestedHandler::new(Arc::clone(&collaborators.catalog), producer.clone()),
            ));
        }

        let invoices = has(ServiceRole::Invoice).then(|| {
            let service = InvoiceService::new(
                Arc::clone(&collaborators.invoices),
                Arc::clone(&collaborators.catalog),
            );
            runtime.spawn(wiring.consumer(
                groups::INVOICE_SERVICE,
                CartCheckedOutHandler::new(service.clone()),
            ));
            service
        });

        let login = has(ServiceRole::User)
            .then(|| LoginService::new(Arc::clone(&collaborators.users), producer.clone()));

        tracing::info!(consumers = runtime.len(), "node started");

        Self {
            cart,
            login,
            invoices,
            correlator,
            runtime,
        }
    }

    pub fn cart(&self) -> Option<&CartService> {
        self.cart.as_ref()
    }

    pub fn login(&self) -> Option<&LoginService> {
        self.login.as_ref()
    }

    pub fn invoices(&self) -> Option<&InvoiceService> {
        self.invoices.as_ref()
    }

    pub fn correlator(&self) -> &Correlator<ProductId> {
        &self.correlator
    }

    pub fn statuses(&self) -> ConsumerStatuses {
        self.runtime.statuses()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.runtime.cancel_token()
    }

    /// Cancelled once any consumer has faulted on a fatal broker error.
    pub fn fault_signal(&self) -> CancellationToken {
        self.runtime.fault_signal()
    }

    /// Stops every consumer and resolves any pending existence check to
    /// `false`.
    pub async fn shutdown(self) {
        let outcomes = self.runtime.shutdown().await;
        self.correlator.shutdown();

        let failed = outcomes.iter().filter(|(_, o)| o.is_err()).count();
        tracing::info!(consumers = outcomes.len(), failed, "node stopped");
    }
}
