use std::marker::PhantomData;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, instrument};

use session::bootstrap::Portal;
use session::gateway::{ApiGateway, ApiRequest};
use session::search_cache::{SearchCache, SearchCacheConfig};
use session::AuthError;

use crate::gst::{self, GstError};
use crate::models::{BankAccount, Business, Client, Invoice};

#[derive(Debug, Error)]
pub enum BillingError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Gst(#[from] GstError),
    #[error("{0} has no state code or GSTIN")]
    MissingState(&'static str),
}

/// Resource endpoints
#[derive(Debug, Clone)]
pub struct BillingPaths {
    pub businesses: String,
    pub clients: String,
    pub client_search: String,
    pub invoices: String,
    pub bank_accounts: String,
}

impl Default for BillingPaths {
    fn default() -> Self {
        Self {
            businesses: "/businesses".into(),
            clients: "/clients".into(),
            client_search: "/clients/search".into(),
            invoices: "/invoices".into(),
            bank_accounts: "/bank-accounts".into(),
        }
    }
}

/// CRUD over one REST collection.
pub struct Resource<'a, T> {
    gateway: &'a ApiGateway,
    path: &'a str,
    _marker: PhantomData<T>,
}

impl<'a, T> Resource<'a, T>
where
    T: Serialize + DeserializeOwned,
{
    fn new(gateway: &'a ApiGateway, path: &'a str) -> Self {
        Self {
            gateway,
            path,
            _marker: PhantomData,
        }
    }

    fn item_path(&self, id: &str) -> String {
        format!("{}/{}", self.path.trim_end_matches('/'), id)
    }

    pub async fn list(&self) -> Result<Vec<T>, AuthError> {
        self.gateway.get(self.path).await
    }

    pub async fn get(&self, id: &str) -> Result<T, AuthError> {
        self.gateway.get(&self.item_path(id)).await
    }

    pub async fn create(&self, item: &T) -> Result<T, AuthError> {
        self.gateway.post(self.path, item).await
    }

    pub async fn update(&self, id: &str, item: &T) -> Result<T, AuthError> {
        self.gateway.put(&self.item_path(id), item).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), AuthError> {
        let _: Value = self.gateway.delete(&self.item_path(id)).await?;
        Ok(())
    }
}

/// Typed access to the billing backend.
pub struct BillingApi {
    gateway: Arc<ApiGateway>,
    paths: BillingPaths,
    client_search: SearchCache<Vec<Client>>,
}

impl BillingApi {
    pub fn new(gateway: Arc<ApiGateway>, paths: BillingPaths, cache: &SearchCacheConfig) -> Self {
        Self {
            gateway,
            paths,
            client_search: SearchCache::new(cache),
        }
    }

    /// Build over a bootstrapped portal; cached searches are dropped on logout.
    pub fn from_portal(portal: &Portal) -> Self {
        let api = Self::new(
            portal.gateway.clone(),
            BillingPaths::default(),
            &portal.search_cache,
        );
        portal.auth.on_logout(Arc::new(api.client_search.clone()));
        api
    }

    pub fn businesses(&self) -> Resource<'_, Business> {
        Resource::new(&self.gateway, &self.paths.businesses)
    }

    pub fn clients(&self) -> Resource<'_, Client> {
        Resource::new(&self.gateway, &self.paths.clients)
    }

    pub fn invoices(&self) -> Resource<'_, Invoice> {
        Resource::new(&self.gateway, &self.paths.invoices)
    }

    pub fn bank_accounts(&self) -> Resource<'_, BankAccount> {
        Resource::new(&self.gateway, &self.paths.bank_accounts)
    }

    /// Autocomplete clients by name or GSTIN.
    pub async fn search_clients(&self, query: &str) -> Result<Vec<Client>, AuthError> {
        let gateway = &self.gateway;
        let path = self.paths.client_search.as_str();
        self.client_search
            .get_or_fetch("clients", query, |q| async move {
                gateway.call(ApiRequest::get(path).query("q", q)).await
            })
            .await
    }

    /// Compute GST from the parties' states and create the invoice.
    #[instrument(skip_all, fields(business = ?business.id, client = ?client.id))]
    pub async fn create_invoice(
        &self,
        business: &Business,
        client: &Client,
        mut invoice: Invoice,
    ) -> Result<Invoice, BillingError> {
        let supplier = business.state().ok_or(BillingError::MissingState("business"))?;
        let place = match invoice.place_of_supply.clone() {
            Some(place) => place,
            None => client.state().ok_or(BillingError::MissingState("client"))?,
        };
        let kind = gst::supply_kind(&supplier, &place);
        invoice.place_of_supply = Some(place);
        invoice.apply_totals(kind)?;

        let created = self.invoices().create(&invoice).await?;
        info!(
            event = "invoice_created",
            id = ?created.id,
            grand_total = invoice.totals.as_ref().map(|t| t.grand_total),
            "invoice created"
        );
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InvoiceLine;
    use chrono::NaiveDate;
    use serde_json::json;
    use session::context::SessionContext;
    use session::gateway::transport::mock::MockTransport;
    use session::gateway::{ApiResponse, GatewayConfig};
    use session::TokenStore;

    fn api(transport: Arc<MockTransport>) -> BillingApi {
        let gateway = Arc::new(ApiGateway::new(
            transport,
            TokenStore::in_memory(),
            Arc::new(SessionContext::new()),
            GatewayConfig::default(),
        ));
        BillingApi::new(gateway, BillingPaths::default(), &SearchCacheConfig::default())
    }

    fn ok(data: Value) -> Result<ApiResponse, session::gateway::TransportError> {
        Ok(ApiResponse::new(200, json!({"success": true, "data": data})))
    }

    #[tokio::test]
    async fn crud_paths_and_methods() -> anyhow::Result<()> {
        let transport = Arc::new(MockTransport::new(|req| {
            match (req.method.as_str(), req.path.as_str()) {
                ("GET", "/clients") => ok(json!([{"_id": "c-1", "name": "Acme"}])),
                ("PUT", "/clients/c-1") => ok(req.body.clone().unwrap_or_default()),
                ("DELETE", "/bank-accounts/ba-1") => ok(Value::Null),
                _ => Ok(ApiResponse::new(
                    404,
                    json!({"success": false, "message": "Not found"}),
                )),
            }
        }));
        let api = api(transport.clone());

        let clients = api.clients().list().await?;
        assert_eq!(clients[0].name, "Acme");

        let mut acme = clients[0].clone();
        acme.email = Some("accounts@acme.in".into());
        let updated = api.clients().update("c-1", &acme).await?;
        assert_eq!(updated.email.as_deref(), Some("accounts@acme.in"));

        api.bank_accounts().delete("ba-1").await?;

        let missing = api.businesses().get("b-404").await.unwrap_err();
        assert_eq!(missing.status(), Some(404));
        assert_eq!(transport.requests().len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn client_search_is_cached() -> anyhow::Result<()> {
        let transport = Arc::new(MockTransport::new(|req| {
            assert_eq!(req.path, "/clients/search");
            ok(json!([{"name": format!("{} Retail", req.query[0].1)}]))
        }));
        let api = api(transport.clone());

        let first = api.search_clients("Acme").await?;
        let second = api.search_clients("acme ").await?;
        assert_eq!(first, second);
        assert_eq!(first[0].name, "Acme Retail");
        assert_eq!(transport.count("/clients/search"), 1);
        Ok(())
    }

    fn invoice(place_of_supply: Option<&str>) -> Invoice {
        Invoice {
            business_id: "b-1".into(),
            client_id: "c-1".into(),
            issue_date: NaiveDate::from_ymd_opt(2024, 7, 15).unwrap(),
            place_of_supply: place_of_supply.map(str::to_string),
            lines: vec![InvoiceLine {
                description: "Widgets".into(),
                quantity: 10,
                unit_price: 1_000,
                gst_rate: 1200,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_invoice_computes_gst_before_sending() -> anyhow::Result<()> {
        let transport = Arc::new(MockTransport::new(|req| {
            let mut body = req.body.clone().unwrap_or_default();
            body["id"] = json!("inv-1");
            ok(body)
        }));
        let api = api(transport.clone());
        let business = Business {
            name: "Rao Traders".into(),
            gstin: Some("29ABCDE1234F1Z5".into()),
            ..Default::default()
        };
        let local = Client {
            name: "Blr Stores".into(),
            state_code: Some("29".into()),
            ..Default::default()
        };
        let remote = Client {
            name: "Pune Retail".into(),
            gstin: Some("27AAACA1234A1Z1".into()),
            ..Default::default()
        };

        let created = api.create_invoice(&business, &local, invoice(None)).await?;
        assert_eq!(created.id.as_deref(), Some("inv-1"));
        let totals = created.totals.unwrap();
        assert_eq!((totals.cgst, totals.sgst, totals.igst), (600, 600, 0));

        let sent = transport.requests()[0].body.clone().unwrap();
        assert_eq!(sent["supplyKind"], "INTRA_STATE");
        assert_eq!(sent["placeOfSupply"], "29");

        let created = api.create_invoice(&business, &remote, invoice(None)).await?;
        assert_eq!(created.totals.unwrap().igst, 1_200);

        // explicit place of supply overrides the client's state
        let created = api.create_invoice(&business, &remote, invoice(Some("29"))).await?;
        assert_eq!(created.supply_kind, Some(gst::SupplyKind::IntraState));
        Ok(())
    }

    #[tokio::test]
    async fn create_invoice_validates_locally() {
        let transport = Arc::new(MockTransport::new(|_| ok(json!({}))));
        let api = api(transport.clone());
        let business = Business {
            name: "No GST".into(),
            ..Default::default()
        };
        let client = Client {
            name: "Acme".into(),
            state_code: Some("29".into()),
            ..Default::default()
        };

        let err = api.create_invoice(&business, &client, invoice(None)).await.unwrap_err();
        assert!(matches!(err, BillingError::MissingState("business")));

        let business = Business {
            state_code: Some("29".into()),
            ..business
        };
        let mut bad = invoice(None);
        bad.lines[0].discount = 1_000_000;
        let err = api.create_invoice(&business, &client, bad).await.unwrap_err();
        assert!(matches!(err, BillingError::Gst(GstError::DiscountExceedsGross { .. })));
        assert!(transport.requests().is_empty());
    }
}
