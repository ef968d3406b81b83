use gzip_response_writer::{
    BoxError, CompressionHandler, Handler, HandlerService, ResponseSink,
};
use http::{Request, StatusCode};
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use serde::Serialize;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Startup configuration, read once from the environment.
#[derive(Debug, Clone)]
struct DemoConfig {
    addr: SocketAddr,
    name: String,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            name: String::new(),
        }
    }
}

impl DemoConfig {
    fn from_env() -> Result<Self, BoxError> {
        let mut config = Self::default();
        if let Ok(addr) = env::var("HELLOWORLD_ADDR") {
            config.addr = addr.parse()?;
        }
        if let Ok(name) = env::var("HELLOWORLD_NAME") {
            config.name = name;
        }
        Ok(config)
    }
}

#[derive(Serialize)]
struct HelloWorldResponse {
    message: String,
}

#[derive(Debug, Clone)]
struct HelloWorld {
    config: Arc<DemoConfig>,
}

impl<B> Handler<B> for HelloWorld {
    fn serve(&self, _req: &Request<B>, sink: &mut dyn ResponseSink) -> Result<(), BoxError> {
        let response = HelloWorldResponse {
            message: format!("Hello {}", self.config.name),
        };
        let mut body = serde_json::to_vec(&response)?;
        body.push(b'\n');
        sink.write_all(&body)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Routes {
    hello_world: CompressionHandler<HelloWorld>,
}

impl<B> Handler<B> for Routes {
    fn serve(&self, req: &Request<B>, sink: &mut dyn ResponseSink) -> Result<(), BoxError> {
        match req.uri().path() {
            "/helloworld" => self.hello_world.serve(req, sink),
            _ => {
                sink.set_status(StatusCode::NOT_FOUND);
                Ok(())
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Arc::new(DemoConfig::from_env()?);
    let service = HandlerService::new(Routes {
        hello_world: CompressionHandler::new(HelloWorld {
            config: config.clone(),
        }),
    });

    let listener = TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "server starting");

    loop {
        let (stream, peer) = listener.accept().await?;
        let service = TowerToHyperService::new(service.clone());

        tokio::spawn(async move {
            if let Err(error) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                tracing::warn!(%peer, %error, "connection failed");
            }
        });
    }
}
