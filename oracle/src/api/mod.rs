//! The query API: a small actix-web server exposing the two read-only
//! endpoints operators and explorers poll against the ledger this oracle
//! maintains. Bootstrapped the same way the rest of this codebase's HTTP
//! servers are -- `HttpServer::new` building an `App` per worker, bound
//! once, then run as a background task the caller can stop independently
//! of the indexing loop.

pub mod types;

use actix_web::dev::ServerHandle;
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use log::error;

use crate::store::StateStore;
use types::{
    Envelope, GetGasFeeRequest, GetGasFeeResult, GetRewardsRequest, GetRewardsResult, ERROR_INTERNAL,
    ERROR_INVALID_PARAMS,
};

pub fn spawn(
    store: StateStore,
    bind_address: &str,
    workers: usize,
) -> std::io::Result<(ServerHandle, tokio::task::JoinHandle<std::io::Result<()>>)> {
    let store_data = web::Data::new(store);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(store_data.clone())
            .route("/api/v1/getrewards", web::post().to(get_rewards))
            .route("/api/v1/getgasfee", web::post().to(get_gas_fee))
    })
    .disable_signals()
    .bind(bind_address)?
    .workers(workers)
    .run();

    let handle = server.handle();
    let join = tokio::spawn(server);
    Ok((handle, join))
}

async fn get_rewards(store: web::Data<StateStore>, req: web::Json<GetRewardsRequest>) -> impl Responder {
    if req.addresses.is_empty() {
        return HttpResponse::Ok().json(Envelope::<GetRewardsResult>::error(
            "getrewards",
            ERROR_INVALID_PARAMS,
            "Addresses must not be empty",
        ));
    }

    // Returned in the same order as the request's Addresses.
    let mut amounts = Vec::with_capacity(req.addresses.len());
    for address in &req.addresses {
        match store.sum_rewards_up_to(*address, req.end_height).await {
            Ok(amount) => amounts.push(amount.to_string()),
            Err(e) => {
                error!("getrewards: store error summing rewards for {address}: {e}");
                return HttpResponse::Ok().json(Envelope::<GetRewardsResult>::error(
                    "getrewards",
                    ERROR_INTERNAL,
                    e.to_string(),
                ));
            }
        }
    }

    HttpResponse::Ok().json(Envelope::ok(
        "getrewards",
        GetRewardsResult {
            id: req.id.clone(),
            amount: amounts,
        },
    ))
}

async fn get_gas_fee(store: web::Data<StateStore>, req: web::Json<GetGasFeeRequest>) -> impl Responder {
    if req.addresses.is_empty() {
        return HttpResponse::Ok().json(Envelope::<GetGasFeeResult>::error(
            "getgasfee",
            ERROR_INVALID_PARAMS,
            "Addresses must not be empty",
        ));
    }

    match store.sum_total_gas_up_to(req.end_height).await {
        // Gas isn't tracked per address; every requested address gets the
        // same network-wide total.
        Ok(total) => {
            let amounts = vec![total.to_string(); req.addresses.len()];
            HttpResponse::Ok().json(Envelope::ok(
                "getgasfee",
                GetGasFeeResult {
                    id: req.id.clone(),
                    amount: amounts,
                },
            ))
        }
        Err(e) => {
            error!("getgasfee: store error: {e}");
            HttpResponse::Ok().json(Envelope::<GetGasFeeResult>::error(
                "getgasfee",
                ERROR_INTERNAL,
                e.to_string(),
            ))
        }
    }
}
