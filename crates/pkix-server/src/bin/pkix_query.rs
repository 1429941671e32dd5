//! Command-line OCSP and TSP client
//!
//! ```text
//! pkix-query ocsp --cert leaf.pem --issuer ca.pem --url http://ocsp.example.com
//! pkix-query tsp --file report.pdf --url http://tsa.example.com
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use http::Method;
use pkix_proto::ocsp::{CertId, CertStatus, Request, Response};
use pkix_proto::{oid, tsp, Certificate, HttpTransportable, PkiMessage, RetryPolicy, Signable, UpstreamClient};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Query OCSP responders and time-stamp authorities")]
#[command(name = "pkix-query")]
struct Cli {
    /// Request timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask an OCSP responder for the status of a certificate
    Ocsp {
        /// Certificate to check (PEM or DER)
        #[arg(long)]
        cert: PathBuf,
        /// Issuer of the certificate (PEM or DER)
        #[arg(long)]
        issuer: PathBuf,
        /// Responder URL
        #[arg(long)]
        url: String,
        #[arg(long, value_enum, default_value_t = HttpMethod::Post)]
        method: HttpMethod,
        /// CertID hash algorithm
        #[arg(long, value_enum, default_value_t = HashAlgorithm::Sha1)]
        hash: HashAlgorithm,
    },
    /// Time-stamp a file
    Tsp {
        /// File to time-stamp (hashed with SHA-256)
        #[arg(long)]
        file: PathBuf,
        /// TSA URL
        #[arg(long)]
        url: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    fn method(self) -> Method {
        match self {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    fn oid(self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => oid::SHA1,
            HashAlgorithm::Sha256 => oid::SHA256,
            HashAlgorithm::Sha384 => oid::SHA384,
            HashAlgorithm::Sha512 => oid::SHA512,
        }
    }
}

type QueryResult = Result<(), Box<dyn std::error::Error>>;

fn load_certificate(path: &Path) -> Result<Certificate, Box<dyn std::error::Error>> {
    let data = std::fs::read(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    Ok(Certificate::from_bytes(data)?)
}

async fn query_ocsp(
    client: &UpstreamClient,
    cert: &Path,
    issuer: &Path,
    url: &str,
    method: Method,
    hash: HashAlgorithm,
) -> QueryResult {
    let cert = load_certificate(cert)?;
    let issuer = load_certificate(issuer)?;
    let cert_id = CertId::for_certificate(&cert, &issuer, hash.oid())?;
    let request = Request::create_from_params(&cert_id)?;

    println!("Serial number:    {}", cert_id.serial_number);
    println!("Issuer name hash: {}", cert_id.issuer_name_hash);
    println!("Issuer key hash:  {}", cert_id.issuer_key_hash);

    let reply = request.send(client, url, &method).await?;
    println!("HTTP status:      {}", reply.status);
    if !reply.status.is_success() {
        return Err(format!("responder returned {}", reply.status).into());
    }

    let response = Response::from_der(reply.body.to_vec())?;
    println!("Response status:  {:?}", response.status());
    if response.response_type().is_none() {
        return Ok(());
    }

    if response.cert_id()? != &cert_id {
        println!("WARNING: response is for a different certificate");
    }

    let dates = response.dates()?;
    match response.cert_status()? {
        CertStatus::Revoked { reason, .. } => {
            println!("Cert status:      revoked");
            if let Some(reason) = reason {
                println!("Reason code:      {}", reason);
            }
        }
        status => println!("Cert status:      {}", status.label()),
    }
    println!("Produced at:      {}", dates.produced_at);
    println!("This update:      {}", dates.this_update);
    if let Some(next_update) = dates.next_update {
        println!("Next update:      {}", next_update);
    }
    if let Some(revocation_time) = dates.revocation_time {
        println!("Revocation time:  {}", revocation_time);
    }

    let mut verified = response.verify_signature(None)?;
    if verified.is_empty() {
        // Responses signed directly by the CA often omit the certificate
        verified = response.verify_signature(Some(issuer.der()))?;
    }
    match verified.first() {
        Some(signer) => {
            let signer = Certificate::from_der(signer.clone())?;
            println!("Signature:        OK (signer serial {})", signer.serial_number_hex());
        }
        None => println!("Signature:        NOT VERIFIED"),
    }
    Ok(())
}

async fn query_tsp(client: &UpstreamClient, file: &Path, url: &str) -> QueryResult {
    let data = std::fs::read(file).map_err(|e| format!("{}: {}", file.display(), e))?;
    let digest = pkix_proto::crypto::digest(oid::SHA256, &data)?;
    let request = tsp::Request::create_from_params(oid::SHA256, &digest)?;
    println!("SHA-256:          {}", hex::encode(&digest));

    let reply = request.send(client, url, &Method::POST).await?;
    println!("HTTP status:      {}", reply.status);
    if !reply.status.is_success() {
        return Err(format!("TSA returned {}", reply.status).into());
    }

    let response = tsp::Response::from_der(reply.body.to_vec())?;
    println!("PKI status:       {:?}", response.status());
    for text in response.status_text() {
        println!("Status text:      {}", text);
    }
    if !response.status().is_granted() {
        for failure in response.failures() {
            println!("Failure:          {:?}", failure);
        }
        return Ok(());
    }

    println!("Policy:           {}", response.policy_id()?);
    println!("Serial number:    {}", response.serial_number()?.to_str_radix(16));
    println!("Generation time:  {}", response.gen_time()?);
    if let Some(accuracy) = response.accuracy()? {
        println!(
            "Accuracy:         {}s {}ms {}us",
            accuracy.seconds, accuracy.millis, accuracy.micros
        );
    }
    println!("Ordering:         {}", response.ordering()?);
    if let Some(nonce) = response.nonce()? {
        println!("Nonce:            {}", hex::encode(nonce));
    }

    if let Some(info) = response.tst_info() {
        let (_, imprint) = info.message_imprint();
        if imprint != digest.as_slice() {
            println!("WARNING: message imprint does not match the file");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let client = match UpstreamClient::new(Duration::from_secs(cli.timeout), RetryPolicy::default()) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let result = match &cli.command {
        Command::Ocsp {
            cert,
            issuer,
            url,
            method,
            hash,
        } => query_ocsp(&client, cert, issuer, url, method.method(), *hash).await,
        Command::Tsp { file, url } => query_tsp(&client, file, url).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
