use crate::bridge::model::DashboardModel;
use crate::generator::profile::GeneratorConfig;
use crate::workflow::runner::{Runner, WorkflowResult};
use anyhow::{anyhow, Context, Result};
use guardcore::Event;
use log::{error, info, warn};
use serde_json::json;
use std::{
    net::SocketAddr,
    sync::{Arc, RwLock},
    thread,
};
use tokio::runtime::Builder;
use warp::{http::StatusCode, Filter};

pub fn bridge_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9000))
}

#[derive(Debug)]
struct BridgeError;

impl warp::reject::Reject for BridgeError {}

type SharedModel = Arc<RwLock<DashboardModel>>;

fn store(model: &SharedModel, result: &WorkflowResult, runner: &Runner) -> Result<()> {
    let mut guard = model
        .write()
        .map_err(|_| anyhow!("dashboard model lock poisoned"))?;
    *guard = DashboardModel::from_result(result, runner.metrics());
    Ok(())
}

fn respond(
    model: &SharedModel,
    runner: &Runner,
    outcome: Result<WorkflowResult>,
    route: &str,
) -> Result<warp::reply::WithStatus<warp::reply::Json>, warp::Rejection> {
    match outcome.and_then(|result| store(model, &result, runner).map(|_| result)) {
        Ok(result) => Ok(warp::reply::with_status(
            warp::reply::json(&result),
            StatusCode::OK,
        )),
        Err(err) => {
            error!("{} error: {:#}", route, err);
            Err(warp::reject::custom(BridgeError))
        }
    }
}

/// Routes: `GET /telemetry`, `POST /ingest` (JSON event array) and
/// `POST /ingest-scenario` (generator config).
pub fn routes(
    model: SharedModel,
    runner: Arc<Runner>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let model_filter = warp::any().map(move || model.clone());
    let runner_filter = warp::any().map(move || runner.clone());

    let telemetry_route = warp::path("telemetry")
        .and(warp::path::end())
        .and(warp::get())
        .and(model_filter.clone())
        .and_then(|model: SharedModel| async move {
            let snapshot = model
                .read()
                .map_err(|_| warp::reject::custom(BridgeError))?
                .clone();
            Ok::<_, warp::Rejection>(warp::reply::json(&snapshot))
        });

    let ingest_route = warp::path("ingest")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(model_filter.clone())
        .and(runner_filter.clone())
        .and_then(
            |events: Vec<Event>, model: SharedModel, runner: Arc<Runner>| async move {
                let outcome = runner.execute(&events);
                respond(&model, &runner, outcome, "ingest")
            },
        );

    let scenario_route = warp::path("ingest-scenario")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(model_filter)
        .and(runner_filter)
        .and_then(
            |config: GeneratorConfig, model: SharedModel, runner: Arc<Runner>| async move {
                if let Err(err) = config.validate() {
                    warn!("ingest-scenario refused: {:#}", err);
                    return Ok(warp::reply::with_status(
                        warp::reply::json(&json!({
                            "status": "rejected",
                            "error": format!("{:#}", err)
                        })),
                        StatusCode::BAD_REQUEST,
                    ));
                }
                let outcome = runner.execute_generated(&config);
                if let (Ok(result), Some(description)) = (&outcome, &config.description) {
                    info!("[bridge] {} -> emitted {}", description, result.emitted);
                }
                respond(&model, &runner, outcome, "ingest-scenario")
            },
        );

    telemetry_route.or(ingest_route).or(scenario_route)
}

/// Hosts the telemetry endpoint and feeds ingested batches to the runner.
pub struct TelemetryBridge {
    model: SharedModel,
    runner: Arc<Runner>,
}

impl TelemetryBridge {
    pub fn new(runner: Arc<Runner>) -> Self {
        Self {
            model: Arc::new(RwLock::new(DashboardModel::default())),
            runner,
        }
    }

    pub fn routes(&self) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
        routes(self.model.clone(), self.runner.clone())
    }

    /// Serves the routes on a background thread with its own runtime.
    pub fn serve(&self, addr: SocketAddr) -> Result<thread::JoinHandle<()>> {
        let routes = self.routes();
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .context("building bridge runtime")?;
        let handle = thread::Builder::new()
            .name("telemetry-bridge".into())
            .spawn(move || {
                runtime.block_on(async move {
                    warp::serve(routes).run(addr).await;
                });
            })
            .context("spawning bridge thread")?;
        info!("[bridge] listening on http://{}", addr);
        Ok(handle)
    }

    pub fn publish(&self, result: &WorkflowResult) -> Result<()> {
        store(&self.model, result, &self.runner)?;
        info!(
            "[bridge] emitted {} buffer {}/{} quiet {}",
            result.emitted,
            result.buffer_len,
            result.buffer_capacity,
            result.telemetry.is_quiet()
        );
        Ok(())
    }

    pub fn publish_status(&self, message: &str) {
        info!("[bridge] {}", message);
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> Result<DashboardModel> {
        let guard = self
            .model
            .read()
            .map_err(|_| anyhow!("dashboard model lock poisoned"))?;
        Ok(guard.clone())
    }
}
