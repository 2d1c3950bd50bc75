//! Typed order endpoints

use crate::http::HttpClient;
use crate::proof::ProofFile;
use crate::{ClientError, ClientResult};
use async_trait::async_trait;
use serde::Deserialize;
use shared::order::{
    CancelOrderRequest, CreateOrderRequest, ExploreQuery, Order, OrderIdRequest, OrderQuery,
    ProofQuery,
};

/// Order endpoints of the marketplace backend
#[async_trait]
pub trait OrderApi: Send + Sync {
    async fn create_order(&self, request: &CreateOrderRequest) -> ClientResult<Order>;
    async fn my_orders(&self, query: &OrderQuery) -> ClientResult<Vec<Order>>;
    async fn my_accepted_orders(&self, query: &OrderQuery) -> ClientResult<Vec<Order>>;
    /// Pending orders open for acceptance
    async fn explore_orders(&self, query: &ExploreQuery) -> ClientResult<Vec<Order>>;
    async fn accept_order(&self, order_id: &str) -> ClientResult<()>;
    async fn cancel_order(&self, order_id: &str, reason: Option<&str>) -> ClientResult<()>;
    async fn cancel_acceptance(&self, order_id: &str, reason: Option<&str>) -> ClientResult<()>;
    async fn confirm_payment(&self, order_id: &str) -> ClientResult<()>;
    async fn upload_proof(&self, order_id: &str, proof: &ProofFile) -> ClientResult<()>;
    async fn confirm_delivery(&self, order_id: &str) -> ClientResult<()>;
    async fn get_order(&self, order_id: &str) -> ClientResult<Order>;
}

const NO_QUERY: [(&str, &str); 0] = [];

/// List payloads come either bare or wrapped
#[derive(Deserialize)]
#[serde(untagged)]
enum OrderList {
    Bare(Vec<Order>),
    Wrapped { orders: Vec<Order> },
}

impl From<OrderList> for Vec<Order> {
    fn from(list: OrderList) -> Self {
        match list {
            OrderList::Bare(orders) | OrderList::Wrapped { orders } => orders,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SingleOrder {
    Bare(Box<Order>),
    Wrapped { order: Box<Order> },
}

impl From<SingleOrder> for Order {
    fn from(single: SingleOrder) -> Self {
        match single {
            SingleOrder::Bare(order) | SingleOrder::Wrapped { order } => *order,
        }
    }
}

/// [`OrderApi`] over any [`HttpClient`]
#[derive(Debug, Clone)]
pub struct RestOrderApi<C> {
    http: C,
}

impl<C: HttpClient> RestOrderApi<C> {
    pub fn new(http: C) -> Self {
        Self { http }
    }

    pub fn http(&self) -> &C {
        &self.http
    }

    /// POST an acknowledgement-only transition; the body, if any, is ignored
    async fn acknowledge<B: serde::Serialize + Sync>(&self, path: &str, body: &B) -> ClientResult<()> {
        let _: serde_json::Value = self.http.post(path, body).await?;
        Ok(())
    }
}

fn order_id_body(order_id: &str) -> OrderIdRequest {
    OrderIdRequest {
        order_id: order_id.to_string(),
    }
}

fn cancel_body(order_id: &str, reason: Option<&str>) -> CancelOrderRequest {
    CancelOrderRequest {
        order_id: order_id.to_string(),
        reason: reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string),
    }
}

#[async_trait]
impl<C: HttpClient> OrderApi for RestOrderApi<C> {
    #[tracing::instrument(skip_all, fields(product = %request.product_name))]
    async fn create_order(&self, request: &CreateOrderRequest) -> ClientResult<Order> {
        let order: SingleOrder = self.http.post("/api/orders/create", request).await?;
        Ok(order.into())
    }

    async fn my_orders(&self, query: &OrderQuery) -> ClientResult<Vec<Order>> {
        let list: OrderList = self.http.get("/api/orders/my-orders", query).await?;
        Ok(list.into())
    }

    async fn my_accepted_orders(&self, query: &OrderQuery) -> ClientResult<Vec<Order>> {
        let list: OrderList = self.http.get("/api/orders/my-accepted-orders", query).await?;
        Ok(list.into())
    }

    async fn explore_orders(&self, query: &ExploreQuery) -> ClientResult<Vec<Order>> {
        let list: OrderList = self.http.get("/api/orders/explore", query).await?;
        Ok(list.into())
    }

    #[tracing::instrument(skip(self))]
    async fn accept_order(&self, order_id: &str) -> ClientResult<()> {
        self.acknowledge("/api/orders/accept", &order_id_body(order_id))
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_order(&self, order_id: &str, reason: Option<&str>) -> ClientResult<()> {
        self.acknowledge("/api/orders/cancel", &cancel_body(order_id, reason))
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_acceptance(&self, order_id: &str, reason: Option<&str>) -> ClientResult<()> {
        self.acknowledge("/api/orders/cancel-acceptance", &cancel_body(order_id, reason))
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn confirm_payment(&self, order_id: &str) -> ClientResult<()> {
        self.acknowledge("/api/orders/confirm-payment", &order_id_body(order_id))
            .await
    }

    #[tracing::instrument(skip(self, proof), fields(file = %proof.file_name, size = proof.len()))]
    async fn upload_proof(&self, order_id: &str, proof: &ProofFile) -> ClientResult<()> {
        if proof.is_empty() {
            return Err(ClientError::Validation("proof: file is empty".into()));
        }
        let query = ProofQuery {
            order_id: order_id.to_string(),
        };
        let _: serde_json::Value = self
            .http
            .post_multipart("/api/orders/upload-proof", &query, proof.to_form()?)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn confirm_delivery(&self, order_id: &str) -> ClientResult<()> {
        self.acknowledge("/api/orders/confirm-delivery", &order_id_body(order_id))
            .await
    }

    async fn get_order(&self, order_id: &str) -> ClientResult<Order> {
        // The id becomes a path segment
        if order_id.trim().is_empty() || order_id.contains(['/', '?', '#']) {
            return Err(ClientError::Validation(format!(
                "orderId: invalid order id {order_id:?}"
            )));
        }
        let order: SingleOrder = self
            .http
            .get(&format!("/api/orders/{order_id}"), &NO_QUERY)
            .await?;
        Ok(order.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::http::NetworkHttpClient;

    const ORDER: &str = r#"{
        "id": "o1",
        "productName": "Lamp",
        "amount": 40,
        "reward": 5,
        "productUrl": "https://shop.example/lamp",
        "status": "pending",
        "buyerId": "b1",
        "createdAt": "2024-05-01T08:00:00Z"
    }"#;

    #[test]
    fn test_list_accepts_bare_and_wrapped() {
        let bare: OrderList = serde_json::from_str(&format!("[{ORDER}]")).unwrap();
        let wrapped: OrderList =
            serde_json::from_str(&format!(r#"{{"orders":[{ORDER}], "total": 1}}"#)).unwrap();
        let bare: Vec<Order> = bare.into();
        let wrapped: Vec<Order> = wrapped.into();
        assert_eq!(bare, wrapped);
        assert_eq!(bare[0].id, "o1");
    }

    #[test]
    fn test_single_accepts_bare_and_wrapped() {
        let bare: SingleOrder = serde_json::from_str(ORDER).unwrap();
        let wrapped: SingleOrder =
            serde_json::from_str(&format!(r#"{{"order":{ORDER}}}"#)).unwrap();
        assert_eq!(Order::from(bare), Order::from(wrapped));
    }

    #[test]
    fn test_cancel_body_drops_blank_reason() {
        assert_eq!(cancel_body("o1", Some("  ")).reason, None);
        assert_eq!(
            cancel_body("o1", Some(" out of stock ")).reason.as_deref(),
            Some("out of stock")
        );
        let json = serde_json::to_value(cancel_body("o1", None)).unwrap();
        assert_eq!(json, serde_json::json!({ "orderId": "o1" }));
    }

    #[tokio::test]
    async fn test_get_order_rejects_ids_that_escape_the_path() {
        let api = RestOrderApi::new(NetworkHttpClient::new(&ClientConfig::default()).unwrap());
        for id in ["", "  ", "a/b", "a?b", "a#b"] {
            let err = api.get_order(id).await.unwrap_err();
            assert!(matches!(err, ClientError::Validation(_)), "{id:?}: {err:?}");
        }
    }
}
