//! Service and printing commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::Serialize;

use arca_core::fiscal::local_now;
use arca_core::soap::SoapTransport;
use arca_core::{Amount, ArcaConfig, Invoice, PointOfSale, VoucherType};
use arca_escpos::{FileSink, Issuer, LineFormatter, PrinterSink, PrinterTarget, Receipt};
use arca_qr::QrPayload;
use arca_wsaa::{Credentials, OpensslSigner, StaticCredentials, WsaaClient};
use arca_wsfe::{AuthorizationOutcome, WsfeClient};

const TICKET_CACHE_FILE: &str = "tickets.json";

/// Stand-in issuer for unauthenticated calls when none is configured.
const PLACEHOLDER_CUIT: &str = "20000000001";

// ============================================================================
// Shared helpers
// ============================================================================

/// Reads an invoice from a JSON file.
pub fn load_invoice(path: &Path) -> Result<Invoice> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading invoice {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing invoice {}", path.display()))
}

/// Ticket cache file: the configured one, else the platform cache dir.
pub fn ticket_cache_path(config: &ArcaConfig) -> Option<PathBuf> {
    config.afip.token_cache.clone().or_else(|| {
        dirs::cache_dir().map(|d| d.join("arca-pos").join(TICKET_CACHE_FILE))
    })
}

fn wsaa_client(config: &ArcaConfig) -> Result<WsaaClient> {
    let mut config = config.clone();
    config.afip.token_cache = ticket_cache_path(&config);
    WsaaClient::from_config(&config).context("building WSAA client")
}

fn wsfe_client(config: &ArcaConfig) -> Result<WsfeClient> {
    let wsaa = Arc::new(wsaa_client(config)?);
    WsfeClient::from_config(config, wsaa).context("building WSFEv1 client")
}

fn formatter(config: &ArcaConfig) -> LineFormatter {
    LineFormatter::for_paper(config.printer.paper_width_mm)
}

/// Sink for `--out`, or the configured printer.
fn sink_for(config: &ArcaConfig, out: Option<&Path>) -> Result<Box<dyn PrinterSink>> {
    if let Some(path) = out {
        return Ok(Box::new(FileSink::new(path)));
    }
    let target = config
        .printer
        .target
        .as_deref()
        .context("no printer configured: set printer.target or pass --out")?;
    Ok(PrinterTarget::parse(target)?.into_sink())
}

async fn send(sink: &mut dyn PrinterSink, job_name: &str, bytes: &[u8]) -> Result<()> {
    sink.send(job_name, bytes)
        .await
        .with_context(|| format!("sending {job_name} to {}", sink.describe()))
}

/// Receipt bytes for an invoice, with the fiscal QR when it is authorized
/// and QR printing is enabled.
pub fn render_receipt(config: &ArcaConfig, invoice: &Invoice) -> Result<Vec<u8>> {
    let issuer = Issuer::from_config(&config.issuer).context("issuer configuration")?;
    let qr = if config.printer.print_qr && invoice.is_authorized() {
        match qr_url(config, invoice) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(error = %e, "fiscal QR omitted from receipt");
                None
            }
        }
    } else {
        None
    };
    Ok(Receipt::invoice(&issuer, invoice, qr.as_deref(), formatter(config)))
}

/// Fiscal QR verification URL.
pub fn qr_url(config: &ArcaConfig, invoice: &Invoice) -> Result<String> {
    let payload = QrPayload::from_invoice(
        config.issuer.cuit()?,
        config.issuer.point_of_sale()?,
        invoice,
    )?;
    Ok(payload.url()?)
}

fn job_name(invoice: &Invoice, point_of_sale: PointOfSale) -> String {
    let number = invoice
        .voucher_number(point_of_sale)
        .map(|n| n.to_string())
        .unwrap_or_else(|| "borrador".to_string());
    format!("{}_{number}", invoice.voucher_type.receipt_label().replace(' ', "_"))
}

// ============================================================================
// Commands
// ============================================================================

/// `status`: configuration, openssl and WSFEv1 health.
///
/// Returns whether everything checked out.
pub async fn status(config: &ArcaConfig) -> Result<bool> {
    let mut healthy = true;

    println!("Environment: {}", config.afip.environment);
    let problems = config.validate();
    if problems.is_empty() {
        println!("Configuration: OK");
    } else {
        healthy = false;
        println!("Configuration: {} problem(s)", problems.len());
        for problem in &problems {
            println!("  - {problem}");
        }
    }

    let signer = OpensslSigner::from_config(&config.afip);
    match signer.version().await {
        Ok(version) => println!("OpenSSL: {version}"),
        Err(e) => {
            healthy = false;
            println!("OpenSSL: unavailable ({e})");
        }
    }

    // FEDummy is unauthenticated; the credentials are never sent.
    let unauthenticated = Arc::new(StaticCredentials(Credentials {
        token: String::new(),
        sign: String::new(),
        cuit: config
            .issuer
            .cuit()
            .or_else(|_| arca_core::Cuit::parse(PLACEHOLDER_CUIT))?,
    }));
    let client = WsfeClient::new(
        config.afip.wsfe_url(),
        SoapTransport::from_config(&config.afip)?,
        unauthenticated,
        PointOfSale::new(1)?,
    );
    match client.dummy().await {
        Ok(status) => {
            healthy &= status.is_ok();
            println!("WSFEv1: {status}");
        }
        Err(e) => {
            healthy = false;
            println!("WSFEv1: unreachable ({e})");
        }
    }

    Ok(healthy)
}

/// `login`: obtain (or reuse) an access ticket.
pub async fn login(config: &ArcaConfig, service: &str, force: bool) -> Result<()> {
    let client = wsaa_client(config)?;
    let ticket = if force {
        client.login(service).await
    } else {
        client.ticket(service).await
    }
    .with_context(|| format!("obtaining access ticket for {service}"))?;
    println!(
        "Ticket for {service} valid until {}",
        ticket.expiration_time.format("%d/%m/%Y %H:%M:%S")
    );
    Ok(())
}

/// `last`: last authorized number for a voucher type.
pub async fn last(config: &ArcaConfig, voucher_type: u16) -> Result<u64> {
    let voucher_type = VoucherType::from_code(voucher_type)?;
    let client = wsfe_client(config)?;
    let number = client
        .last_authorized(voucher_type)
        .await
        .with_context(|| format!("querying last {}", voucher_type.description()))?;
    println!("{}: {number}", voucher_type.description());
    Ok(number)
}

/// Printed by `authorize`.
#[derive(Debug, Serialize)]
pub struct AuthorizeReport {
    /// Service answer
    pub outcome: AuthorizationOutcome,
    /// Invoice with number and CAE filled in
    pub invoice: Invoice,
}

/// `authorize`: request a CAE with the next number.
pub async fn authorize(config: &ArcaConfig, file: &Path, print: bool) -> Result<AuthorizeReport> {
    let mut invoice = load_invoice(file)?;
    let client = wsfe_client(config)?;
    let outcome = client
        .authorize_next(&mut invoice)
        .await
        .context("requesting CAE")?;

    let report = AuthorizeReport { outcome, invoice };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.outcome.is_approved() {
        bail!(
            "voucher rejected with {} observation(s)",
            report.outcome.observations().len()
        );
    }

    if print {
        let bytes = render_receipt(config, &report.invoice)?;
        let mut sink = sink_for(config, None)?;
        send(sink.as_mut(), &job_name(&report.invoice, client.point_of_sale()), &bytes).await?;
    }
    Ok(report)
}

/// `receipt`: render an invoice receipt to a file or the printer.
pub async fn receipt(config: &ArcaConfig, file: &Path, out: Option<&Path>) -> Result<()> {
    let invoice = load_invoice(file)?;
    let bytes = render_receipt(config, &invoice)?;
    let mut sink = sink_for(config, out)?;
    let pos = config.issuer.point_of_sale()?;
    send(sink.as_mut(), &job_name(&invoice, pos), &bytes).await?;
    println!("Receipt sent to {} ({} bytes)", sink.describe(), bytes.len());
    Ok(())
}

/// `qr`: print the fiscal QR URL.
pub fn qr(config: &ArcaConfig, file: &Path) -> Result<String> {
    let invoice = load_invoice(file)?;
    let url = qr_url(config, &invoice)?;
    println!("{url}");
    Ok(url)
}

/// Options for `label`.
#[derive(Debug, Clone)]
pub struct LabelRequest<'a> {
    /// Product name
    pub name: &'a str,
    /// Price text
    pub price: &'a str,
    /// Special offer
    pub offer: bool,
    /// Savings text
    pub savings: Option<&'a str>,
}

/// `label`: print a price label.
pub async fn label(config: &ArcaConfig, request: LabelRequest<'_>, out: Option<&Path>) -> Result<()> {
    let price: Amount = request
        .price
        .parse()
        .with_context(|| format!("invalid price '{}'", request.price))?;
    let savings = request
        .savings
        .map(|s| s.parse::<Amount>().with_context(|| format!("invalid savings '{s}'")))
        .transpose()?;
    if !price.is_positive() {
        bail!("price must be positive");
    }

    let bytes = Receipt::price_label(request.name, price, request.offer, savings, formatter(config));
    let mut sink = sink_for(config, out)?;
    send(sink.as_mut(), "Etiqueta_Precio", &bytes).await?;
    println!("Label for '{}' sent to {}", request.name, sink.describe());
    Ok(())
}

/// `test-print`: printer self-test page.
pub async fn test_print(config: &ArcaConfig, out: Option<&Path>) -> Result<()> {
    let mut sink = sink_for(config, out)?;
    let name = config
        .printer
        .name
        .clone()
        .unwrap_or_else(|| sink.describe());
    let bytes = Receipt::test_page(&name, local_now(), formatter(config));
    send(sink.as_mut(), "POS_Test", &bytes).await?;
    println!("Test page sent to {}", sink.describe());
    Ok(())
}
