//! Prometheus metrics (ambient, SPEC_FULL §1(h)). The static-registry
//! pattern is grounded on `data_analyzer::actors::prometheus_exporter`'s
//! `lazy_static!` + `register_int_gauge!`/`register_int_counter!` idiom; the
//! raw-`hyper` exporter loop is grounded on
//! `epoch_tracker::prometheus::PrometheusExporter`, but reworked here to
//! refresh the revenue/running gauges from the live store on every scrape
//! instead of only serving whatever the engine last pushed — the teacher's
//! exporter has no store to query and never needs this.

use std::net::SocketAddr;
use std::sync::Arc;

use hyper::header::CONTENT_TYPE;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Response, Server};
use lazy_static::lazy_static;
use log::{error, info, warn};
use prometheus::{register_int_counter, register_int_gauge, Encoder, IntCounter, IntGauge, TextEncoder};

use crate::models::AuctionState;
use crate::store::Store;

lazy_static! {
    pub static ref AUCTIONS_RUNNING: IntGauge =
        register_int_gauge!("gift_auction_auctions_running", "Auctions currently in the running state").unwrap();
    pub static ref TOTAL_REVENUE: IntGauge =
        register_int_gauge!("gift_auction_total_revenue", "Sum of revenue across all auctions").unwrap();
    pub static ref BIDS_PLACED_TOTAL: IntCounter =
        register_int_counter!("gift_auction_bids_placed_total", "Successful placeBid/raiseBid calls").unwrap();
    pub static ref ROUNDS_SETTLED_TOTAL: IntCounter =
        register_int_counter!("gift_auction_rounds_settled_total", "Rounds settled by the engine").unwrap();
    pub static ref ENGINE_TICK_ERRORS_TOTAL: IntCounter =
        register_int_counter!("gift_auction_engine_tick_errors_total", "Engine ticks that returned an error").unwrap();
}

/// Recomputes `AUCTIONS_RUNNING`/`TOTAL_REVENUE` from the store. Called by
/// the engine on every tick (cheap, already has a connection open) and again
/// on every `/metrics` scrape, so the exporter reflects current state even
/// between engine ticks rather than a stale push.
pub(crate) async fn refresh_store_gauges(store: &Store) {
    let client = match store.client().await {
        Ok(client) => client,
        Err(e) => {
            warn!("metrics refresh could not open a connection: {}", e);
            return;
        }
    };
    let auctions = match crate::store::auctions::list(&client).await {
        Ok(auctions) => auctions,
        Err(e) => {
            warn!("metrics refresh could not list auctions: {}", e);
            return;
        }
    };
    let running = auctions.iter().filter(|a| a.state == AuctionState::Running).count() as i64;
    let revenue: i64 = auctions.iter().map(|a| a.revenue).sum();
    AUCTIONS_RUNNING.set(running);
    TOTAL_REVENUE.set(revenue);
}

/// Spawns the `/metrics` text exporter as a background task bound to
/// `bind_address`. `store` lets each scrape refresh the live gauges above
/// before encoding the registry.
pub fn spawn(store: Arc<Store>, bind_address: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = bind_address.parse()?;

    tokio::spawn(async move {
        info!("prometheus exporter started on http://{}", &addr);

        let make_svc = make_service_fn(move |_conn| {
            let store = store.clone();
            async move {
                Ok::<_, hyper::Error>(service_fn(move |_req| {
                    let store = store.clone();
                    async move {
                        refresh_store_gauges(&store).await;

                        let encoder = TextEncoder::new();
                        let metric_families = prometheus::gather();
                        let mut buffer = Vec::new();
                        encoder.encode(&metric_families, &mut buffer).unwrap();

                        let response = Response::builder()
                            .status(200)
                            .header(CONTENT_TYPE, encoder.format_type())
                            .body(Body::from(buffer))
                            .unwrap();

                        Ok::<_, hyper::Error>(response)
                    }
                }))
            }
        });

        if let Err(err) = Server::bind(&addr).serve(make_svc).await {
            error!("prometheus exporter error: {}", err);
        }
    });

    Ok(())
}
