//! # naas-client
//!
//! REST client for the external NaaS resource controller. The controller owns
//! the physical resources (ROADMs and friends) and their cross-connections;
//! this crate only speaks its HTTP/XML dialect.
//!
//! The engine consumes the [`Controller`] trait so tests can swap the REST
//! implementation for an in-memory fake.

pub mod xml;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("controller transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("controller reported an error: {0}")]
    Remote(String),
    #[error("controller payload could not be decoded: {0}")]
    MalformedPayload(String),
    #[error("cross-connection id does not have the expected format ({0})")]
    MalformedConnectionId(String),
}

/// Connection settings for the controller's REST endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub address: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl ControllerConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}/naas/", self.address, self.port)
    }
}

/// Opaque id of one cross-connection, `SRC_EP:SRC_LBL::DST_EP:DST_LBL`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// split the id into its endpoint/label parameters
    pub fn params(&self) -> Result<ConnectionParams, ControllerError> {
        let malformed = || ControllerError::MalformedConnectionId(self.0.clone());

        let (src, dst) = self.0.split_once("::").ok_or_else(malformed)?;
        let (src_endpoint, src_label) = src.split_once(':').ok_or_else(malformed)?;
        let (dst_endpoint, dst_label) = dst.split_once(':').ok_or_else(malformed)?;

        if src_endpoint.is_empty() || src_label.is_empty() || dst_endpoint.is_empty() || dst_label.is_empty() {
            return Err(malformed());
        }

        Ok(ConnectionParams {
            src_endpoint: src_endpoint.to_owned(),
            src_label: src_label.to_owned(),
            dst_endpoint: dst_endpoint.to_owned(),
            dst_label: dst_label.to_owned(),
        })
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Endpoint/label parameters of a cross-connection, decoded from its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub src_endpoint: String,
    pub src_label: String,
    pub dst_endpoint: String,
    pub dst_label: String,
}

/// Commands the engine issues against the resource controller.
#[async_trait]
pub trait Controller: Send + Sync + 'static {
    /// every resource the controller knows, grouped as `(type, names)`
    async fn list_resources(&self) -> Result<Vec<(String, Vec<String>)>, ControllerError>;
    /// whether the resource is active on the controller side
    async fn check_availability(
        &self,
        res_type: &str,
        res_name: &str,
    ) -> Result<bool, ControllerError>;
    /// the resource's currently active cross-connections
    async fn list_connections(
        &self,
        res_type: &str,
        res_name: &str,
    ) -> Result<Vec<ConnectionId>, ControllerError>;
    async fn create_connection(
        &self,
        res_type: &str,
        res_name: &str,
        id: &ConnectionId,
        params: &ConnectionParams,
    ) -> Result<(), ControllerError>;
    async fn remove_connection(
        &self,
        res_type: &str,
        res_name: &str,
        id: &ConnectionId,
    ) -> Result<(), ControllerError>;
}

/// [`Controller`] implementation over the controller's REST API.
#[derive(Debug, Clone)]
pub struct RestController {
    http: reqwest::Client,
    base_url: String,
    user: String,
    password: String,
}

impl RestController {
    pub fn new(cfg: &ControllerConfig) -> Self {
        Self::from_base_url(cfg.base_url(), &cfg.user, &cfg.password)
    }

    /// build a client against an explicit base url (handy for tests)
    pub fn from_base_url(
        base_url: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            user: user.into(),
            password: password.into(),
        }
    }

    fn url(&self, command: &str) -> String {
        format!("{}{}", self.base_url, command)
    }

    async fn get(&self, command: &str) -> Result<String, ControllerError> {
        let url = self.url(command);
        debug!(%url, "GET");
        let resp = self
            .http
            .get(&url)
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        debug!(%url, resp_len = resp.len(), "GET done");
        Ok(resp)
    }

    async fn post(&self, command: &str, xml_data: Option<String>) -> Result<String, ControllerError> {
        let url = self.url(command);
        debug!(%url, data = ?xml_data, "POST");
        let mut req = self
            .http
            .post(&url)
            .basic_auth(&self.user, Some(&self.password))
            .header("Content-Type", "application/xml");
        if let Some(data) = xml_data {
            req = req.body(data);
        }
        let resp = req.send().await?.error_for_status()?.text().await?;
        debug!(%url, %resp, "POST done");
        Ok(resp)
    }

    async fn delete(&self, command: &str) -> Result<String, ControllerError> {
        let url = self.url(command);
        debug!(%url, "DELETE");
        let resp = self
            .http
            .delete(&url)
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        debug!(%url, %resp, "DELETE done");
        Ok(resp)
    }

    /// flush the controller's per-resource command queue
    async fn execute(&self, res_type: &str, res_name: &str) -> Result<(), ControllerError> {
        self.post(&format!("{res_type}/{res_name}/queue/execute"), None)
            .await?;
        Ok(())
    }

    async fn resource_id(&self, res_type: &str, res_name: &str) -> Result<String, ControllerError> {
        let id = self.get(&format!("resources/getId/{res_type}/{res_name}")).await?;
        Ok(id.trim().to_owned())
    }
}

#[async_trait]
impl Controller for RestController {
    async fn list_resources(&self) -> Result<Vec<(String, Vec<String>)>, ControllerError> {
        let types = self.get("resources/getResourceTypes").await?;
        let mut ret = Vec::new();
        for res_type in xml::decode_entries(&types) {
            let names = self
                .get(&format!("resources/listResourcesByType/{res_type}"))
                .await?;
            let names = xml::decode_entries(&names);
            if !names.is_empty() {
                ret.push((res_type, names));
            }
        }
        Ok(ret)
    }

    async fn check_availability(
        &self,
        res_type: &str,
        res_name: &str,
    ) -> Result<bool, ControllerError> {
        let id = self.resource_id(res_type, res_name).await?;
        let status = self.get(&format!("resources/getStatus/{id}")).await?;
        Ok(status.trim() == "ACTIVE")
    }

    async fn list_connections(
        &self,
        res_type: &str,
        res_name: &str,
    ) -> Result<Vec<ConnectionId>, ControllerError> {
        let resp = self.get(&format!("{res_type}/{res_name}/xconnect/")).await?;
        // some controller endpoints answer plain error text instead of a document
        if resp.contains("Error") {
            return Err(ControllerError::Remote(resp.trim().to_owned()));
        }
        Ok(xml::decode_entries(&resp)
            .into_iter()
            .map(ConnectionId::new)
            .collect())
    }

    async fn create_connection(
        &self,
        res_type: &str,
        res_name: &str,
        id: &ConnectionId,
        params: &ConnectionParams,
    ) -> Result<(), ControllerError> {
        let data = xml::encode_xconnection(id.as_str(), params)?;
        self.post(&format!("{res_type}/{res_name}/xconnect/"), Some(data))
            .await?;
        self.execute(res_type, res_name).await
    }

    async fn remove_connection(
        &self,
        res_type: &str,
        res_name: &str,
        id: &ConnectionId,
    ) -> Result<(), ControllerError> {
        self.delete(&format!("{res_type}/{res_name}/xconnect/{id}")).await?;
        self.execute(res_type, res_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_splits_into_params() {
        let id = ConnectionId::new("A:1::B:2");
        let params = id.params().expect("well-formed id");
        assert_eq!(
            params,
            ConnectionParams {
                src_endpoint: "A".into(),
                src_label: "1".into(),
                dst_endpoint: "B".into(),
                dst_label: "2".into(),
            }
        );
    }

    #[test]
    fn connection_id_rejects_missing_parts() {
        for bad in ["A:1-B:2", "A::B:2", "A:1::B", ""] {
            assert!(
                ConnectionId::new(bad).params().is_err(),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[tokio::test]
    async fn list_connections_decodes_entries() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/roadm/r1/xconnect/")
            .with_body("<connections><entry>A:1::B:2</entry><entry>C:3::D:4</entry></connections>")
            .create_async()
            .await;

        let client = RestController::from_base_url(format!("{}/", server.url()), "user", "pass");
        let conns = client.list_connections("roadm", "r1").await.expect("list");
        assert_eq!(
            conns,
            vec![ConnectionId::new("A:1::B:2"), ConnectionId::new("C:3::D:4")]
        );
    }

    #[tokio::test]
    async fn list_connections_surfaces_controller_error_text() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/roadm/r1/xconnect/")
            .with_body("Error: resource is not started")
            .create_async()
            .await;

        let client = RestController::from_base_url(format!("{}/", server.url()), "user", "pass");
        let err = client
            .list_connections("roadm", "r1")
            .await
            .expect_err("controller error body");
        assert!(matches!(err, ControllerError::Remote(_)));
    }

    #[tokio::test]
    async fn check_availability_requires_active_status() {
        let mut server = mockito::Server::new_async().await;
        let _id = server
            .mock("GET", "/resources/getId/roadm/r1")
            .with_body("res-17")
            .create_async()
            .await;
        let _status = server
            .mock("GET", "/resources/getStatus/res-17")
            .with_body("ACTIVE")
            .create_async()
            .await;

        let client = RestController::from_base_url(format!("{}/", server.url()), "user", "pass");
        assert!(client.check_availability("roadm", "r1").await.expect("check"));
    }

    #[tokio::test]
    async fn create_connection_posts_document_and_flushes_queue() {
        let mut server = mockito::Server::new_async().await;
        let xconnect = server
            .mock("POST", "/roadm/r1/xconnect/")
            .match_header("content-type", "application/xml")
            .with_body("<response><entry>ok</entry></response>")
            .create_async()
            .await;
        let execute = server
            .mock("POST", "/roadm/r1/queue/execute")
            .with_body("")
            .create_async()
            .await;

        let client = RestController::from_base_url(format!("{}/", server.url()), "user", "pass");
        let id = ConnectionId::new("A:1::B:2");
        let params = id.params().expect("params");
        client
            .create_connection("roadm", "r1", &id, &params)
            .await
            .expect("create");

        xconnect.assert_async().await;
        execute.assert_async().await;
    }

    #[tokio::test]
    async fn transport_failure_is_a_transport_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/roadm/r1/xconnect/")
            .with_status(500)
            .create_async()
            .await;

        let client = RestController::from_base_url(format!("{}/", server.url()), "user", "pass");
        let err = client
            .list_connections("roadm", "r1")
            .await
            .expect_err("http 500");
        assert!(matches!(err, ControllerError::Transport(_)));
    }
}
