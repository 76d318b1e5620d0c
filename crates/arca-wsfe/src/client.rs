//! WSFEv1 client.

use std::sync::Arc;

use arca_core::soap::SoapTransport;
use arca_core::{ArcaConfig, Error, Invoice, PointOfSale, Result, VoucherType};
use arca_wsaa::{Credentials, TicketProvider, WSFE_SERVICE};

use crate::model::{AuthorizationOutcome, ServerStatus};
use crate::wire;

/// Error codes WSFEv1 returns when the token or sign is not accepted.
const TOKEN_ERROR_CODES: std::ops::RangeInclusive<i64> = 600..=602;

/// Client for the electronic invoicing service.
pub struct WsfeClient {
    url: String,
    transport: SoapTransport,
    tickets: Arc<dyn TicketProvider>,
    point_of_sale: PointOfSale,
}

impl WsfeClient {
    /// Creates a client.
    pub fn new(
        url: impl Into<String>,
        transport: SoapTransport,
        tickets: Arc<dyn TicketProvider>,
        point_of_sale: PointOfSale,
    ) -> Self {
        Self {
            url: url.into(),
            transport,
            tickets,
            point_of_sale,
        }
    }

    /// Builds a client from configuration with the given ticket source.
    pub fn from_config(config: &ArcaConfig, tickets: Arc<dyn TicketProvider>) -> Result<Self> {
        Ok(Self::new(
            config.afip.wsfe_url(),
            SoapTransport::from_config(&config.afip)?,
            tickets,
            config.issuer.point_of_sale()?,
        ))
    }

    /// Point of sale used for every request.
    pub fn point_of_sale(&self) -> PointOfSale {
        self.point_of_sale
    }

    /// `FEDummy`: service health, no authentication.
    pub async fn dummy(&self) -> Result<ServerStatus> {
        let body = self
            .transport
            .call(&self.url, &wire::action("FEDummy"), &wire::dummy_body())
            .await?;
        let status = wire::parse_dummy(&body)?;
        tracing::info!(%status, "WSFEv1 status");
        Ok(status)
    }

    /// `FECompUltimoAutorizado`: last number authorized for a voucher type.
    pub async fn last_authorized(&self, voucher_type: VoucherType) -> Result<u64> {
        let credentials = self.credentials().await?;
        let request = wire::last_authorized_body(&credentials, self.point_of_sale, voucher_type);
        let body = self
            .transport
            .call(&self.url, &wire::action("FECompUltimoAutorizado"), &request)
            .await?;
        let last = self.checked(wire::parse_last_authorized(&body)).await?;
        tracing::debug!(
            voucher_type = voucher_type.code(),
            point_of_sale = self.point_of_sale.get(),
            last,
            "last authorized voucher"
        );
        Ok(last)
    }

    /// Next number to use for a voucher type.
    pub async fn next_number(&self, voucher_type: VoucherType) -> Result<u64> {
        Ok(self.last_authorized(voucher_type).await? + 1)
    }

    /// `FECAESolicitar` for an invoice whose number is already assigned.
    pub async fn authorize(&self, invoice: &Invoice) -> Result<AuthorizationOutcome> {
        invoice.validate()?;
        let credentials = self.credentials().await?;
        let request = wire::authorize_body(&credentials, self.point_of_sale, invoice)?;

        tracing::info!(
            voucher_type = invoice.voucher_type.code(),
            number = invoice.number,
            total = %invoice.total,
            "requesting CAE"
        );
        let body = self
            .transport
            .call(&self.url, &wire::action("FECAESolicitar"), &request)
            .await?;
        let outcome = self.checked(wire::parse_authorization(&body)).await?;

        match &outcome {
            AuthorizationOutcome::Approved {
                cae, expires_on, ..
            } => tracing::info!(%cae, %expires_on, "voucher approved"),
            AuthorizationOutcome::Rejected { observations } => {
                for obs in observations {
                    tracing::warn!(code = obs.code, message = %obs.message, "voucher rejected");
                }
            }
        }
        Ok(outcome)
    }

    /// Assigns the next number, requests the CAE, and records it on approval.
    ///
    /// An invoice that already carries a CAE is refused before any request.
    pub async fn authorize_next(&self, invoice: &mut Invoice) -> Result<AuthorizationOutcome> {
        if let Some(existing) = &invoice.authorization {
            return Err(Error::validation_field(
                "authorization",
                format!("already authorized with CAE {}", existing.cae),
            ));
        }
        let number = self.next_number(invoice.voucher_type).await?;
        invoice.number = Some(number);
        let outcome = self.authorize(invoice).await?;
        if let Some(authorization) = outcome.authorization() {
            invoice.authorization = Some(authorization);
        }
        Ok(outcome)
    }

    async fn credentials(&self) -> Result<Credentials> {
        self.tickets.credentials(WSFE_SERVICE).await
    }

    /// Drops the cached ticket when the service rejected it.
    async fn checked<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(Error::Service { errors }) = &result {
            if errors.iter().any(|e| TOKEN_ERROR_CODES.contains(&e.code)) {
                tracing::warn!("access ticket rejected, discarding cached ticket");
                self.tickets.invalidate(WSFE_SERVICE).await?;
            }
        }
        result
    }
}
