//! Blocking HTTP client for the remote contract API.

use serde::de::DeserializeOwned;
use serde::Serialize;

use consync_core::config::ApiConfig;
use consync_core::{
    Contract, ContractArea, ContractGuarantee, ContractTask, OrderNo, RawAreaResponse, Token,
};

use crate::error::GatewayError;
use crate::wire::{
    ApiResponse, ContractPayload, DeletePayload, Envelope, GuaranteePayload, LoginRequest,
    TaskPayload,
};
use crate::{Ack, ContractAck, RemoteGateway};

/// Remote endpoints, relative to `api.base_url`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Login,
    AreaQuery,
    ContractUpsert,
    TaskUpsert,
    GuaranteeUpsert,
    AreaUpsert,
    ContractDelete,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Login => "/GetData/DataAnalysisLogin",
            Endpoint::AreaQuery => "/Contract/ContractTownshipArea",
            Endpoint::ContractUpsert => "/Contract/ContractAddorUpdDoc",
            Endpoint::TaskUpsert => "/Contract/ContractAddorUpdTask",
            Endpoint::GuaranteeUpsert => "/Contract/ContractAddorUpdGuaranteeAmount",
            Endpoint::AreaUpsert => "/Contract/ContractNationalAreaAddOrUpd",
            Endpoint::ContractDelete => "/Contract/ContractDelDoc",
        }
    }

    /// Short name used in errors and log fields.
    pub fn name(self) -> &'static str {
        match self {
            Endpoint::Login => "login",
            Endpoint::AreaQuery => "area query",
            Endpoint::ContractUpsert => "contract upsert",
            Endpoint::TaskUpsert => "task upsert",
            Endpoint::GuaranteeUpsert => "guarantee upsert",
            Endpoint::AreaUpsert => "area upsert",
            Endpoint::ContractDelete => "contract delete",
        }
    }
}

/// [`RemoteGateway`] over HTTP+JSON using a shared `ureq` agent.
///
/// Every call is bounded by the agent's connect and read timeouts.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    agent: ureq::Agent,
    base_url: String,
    lang_code: String,
}

impl HttpGateway {
    pub fn new(api: &ApiConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(api.connect_timeout())
            .timeout_read(api.read_timeout())
            .build();
        Self {
            agent,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            lang_code: api.lang_code.clone(),
        }
    }

    pub fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    fn post_json<B: Serialize, R: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        body: &B,
    ) -> Result<R, GatewayError> {
        let url = self.url(endpoint);
        tracing::debug!(endpoint = endpoint.name(), %url, "POST");
        let response = self
            .agent
            .post(&url)
            .send_json(body)
            .map_err(|err| transport_err(endpoint, err))?;
        response
            .into_json::<R>()
            .map_err(|source| GatewayError::Decode {
                endpoint: endpoint.name(),
                source,
            })
    }

    fn post_envelope<T: Serialize>(
        &self,
        endpoint: Endpoint,
        token: &Token,
        items: Vec<T>,
    ) -> Result<ApiResponse, GatewayError> {
        let envelope = Envelope::new(token.as_str(), &self.lang_code, items);
        let response: ApiResponse = self.post_json(endpoint, &envelope)?;
        let result = response.into_result(endpoint.name());
        if let Err(err) = &result {
            tracing::error!(endpoint = endpoint.name(), error = %err, "remote call failed");
        }
        result
    }
}

impl RemoteGateway for HttpGateway {
    fn login(
        &self,
        username: &str,
        password: &str,
        lang_code: &str,
    ) -> Result<Token, GatewayError> {
        let request = LoginRequest {
            username,
            password,
            lang_code,
        };
        let response: ApiResponse = self.post_json(Endpoint::Login, &request)?;
        let response = response.into_result(Endpoint::Login.name())?;
        // The login endpoint returns the token in `mess`.
        match response.mess {
            Some(token) if !token.is_empty() => Ok(Token(token)),
            _ => Err(GatewayError::Remote {
                endpoint: Endpoint::Login.name(),
                message: "login succeeded without a token".to_string(),
            }),
        }
    }

    fn query_area_codes(
        &self,
        token: &Token,
        province: Option<&str>,
    ) -> Result<RawAreaResponse, GatewayError> {
        let endpoint = Endpoint::AreaQuery;
        let url = self.url(endpoint);
        let mut request = self.agent.get(&url).query("Token", token.as_str());
        if let Some(province) = province.filter(|p| !p.is_empty()) {
            request = request.query("code_prov", province);
        }
        tracing::debug!(endpoint = endpoint.name(), %url, province, "GET");
        let response = request.call().map_err(|err| transport_err(endpoint, err))?;
        response
            .into_json::<RawAreaResponse>()
            .map_err(|source| GatewayError::Decode {
                endpoint: endpoint.name(),
                source,
            })
    }

    fn upsert_contract(
        &self,
        token: &Token,
        contract: &Contract,
    ) -> Result<ContractAck, GatewayError> {
        let response = self.post_envelope(
            Endpoint::ContractUpsert,
            token,
            vec![ContractPayload::new(contract)],
        )?;
        let order_no = response
            .order_no
            .clone()
            .filter(|no| !no.is_empty())
            .map(OrderNo::from);
        tracing::info!(order_no = ?order_no, "contract upserted");
        Ok(ContractAck {
            order_no,
            message: response.message(),
        })
    }

    fn upsert_task(&self, token: &Token, task: &ContractTask) -> Result<Ack, GatewayError> {
        let response =
            self.post_envelope(Endpoint::TaskUpsert, token, vec![TaskPayload::new(task)])?;
        Ok(Ack {
            message: response.message(),
        })
    }

    fn upsert_guarantee(
        &self,
        token: &Token,
        guarantee: &ContractGuarantee,
    ) -> Result<Ack, GatewayError> {
        let response = self.post_envelope(
            Endpoint::GuaranteeUpsert,
            token,
            vec![GuaranteePayload::new(guarantee)],
        )?;
        Ok(Ack {
            message: response.message(),
        })
    }

    fn upsert_areas(&self, token: &Token, areas: &[ContractArea]) -> Result<Ack, GatewayError> {
        let response = self.post_envelope(
            Endpoint::AreaUpsert,
            token,
            areas.iter().collect::<Vec<&ContractArea>>(),
        )?;
        Ok(Ack {
            message: response.message(),
        })
    }

    fn delete_contract(&self, token: &Token, order_no: &OrderNo) -> Result<Ack, GatewayError> {
        let response = self.post_envelope(
            Endpoint::ContractDelete,
            token,
            vec![DeletePayload {
                order_no: order_no.as_str(),
            }],
        )?;
        tracing::info!(order_no = %order_no, "contract deleted");
        Ok(Ack {
            message: response.message(),
        })
    }
}

fn transport_err(endpoint: Endpoint, err: ureq::Error) -> GatewayError {
    let message = match err {
        ureq::Error::Status(code, response) => {
            format!("HTTP {code} {}", response.status_text())
        }
        ureq::Error::Transport(transport) => transport.to_string(),
    };
    GatewayError::Transport {
        endpoint: endpoint.name(),
        message,
    }
}
