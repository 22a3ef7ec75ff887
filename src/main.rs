use std::sync::Arc;

use rust_decimal_macros::dec;
use tokio::signal;
use tracing::{error, info};

use stockpilot::clients::PlatformClientFactory;
use stockpilot::config;
use stockpilot::entities::{
    BomEdge, ChannelType, Material, MovementType, API_KEY_CREDENTIAL,
};
use stockpilot::errors::ServiceResult;
use stockpilot::events::{self, Event};
use stockpilot::metrics::SyncMetrics;
use stockpilot::rate_limiter::RateLimiter;
use stockpilot::repositories::{
    BomEdgeRepository, InMemoryBindingRepository, InMemoryBomEdgeRepository,
    InMemoryChannelRepository, InMemoryCredentialStore, InMemoryMaterialRepository,
    InMemoryStockMovementRepository, InMemorySyncRecordRepository, MaterialRepository,
};
use stockpilot::services::channels::CreateChannelRequest;
use stockpilot::services::stock_movements::RecordMovementRequest;
use stockpilot::services::{
    start_sync_scheduler, AtpService, BomService, ChannelService, StockMovementService,
    SyncService,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::load_config()?;
    config::init_tracing(&cfg.log_level, cfg.log_json);

    // In-memory stores; swap in a real persistence layer behind the same traits
    let materials = Arc::new(InMemoryMaterialRepository::new());
    let edges = Arc::new(InMemoryBomEdgeRepository::new());
    let channels = Arc::new(InMemoryChannelRepository::new());
    let bindings = Arc::new(InMemoryBindingRepository::new());
    let credentials = Arc::new(InMemoryCredentialStore::new());
    let records = Arc::new(InMemorySyncRecordRepository::new());
    let movements = Arc::new(InMemoryStockMovementRepository::new());

    let metrics = Arc::new(SyncMetrics::new());
    let limiter = Arc::new(RateLimiter::new(Arc::clone(&metrics)));
    let clients = Arc::new(PlatformClientFactory::with_defaults(
        Arc::clone(&limiter),
        Arc::clone(&metrics),
        cfg.client_settings(),
    ));

    // Init events
    let (event_sender, event_rx) = events::channel(cfg.event_channel_capacity);
    let event_sender = Arc::new(event_sender);
    let event_processor = tokio::spawn(events::process_events(event_rx));

    // Build services
    let bom_service = BomService::new(edges.clone(), materials.clone());
    let atp_service = AtpService::new(
        materials.clone(),
        bindings.clone(),
        channels.clone(),
        bom_service.clone(),
    );
    let channel_service = ChannelService::new(
        channels.clone(),
        bindings.clone(),
        credentials.clone(),
        materials.clone(),
    );
    let movement_service = StockMovementService::new(
        movements.clone(),
        materials.clone(),
        Some(Arc::clone(&event_sender)),
    );
    let sync_service = SyncService::new(
        channels.clone(),
        bindings.clone(),
        materials.clone(),
        credentials.clone(),
        records.clone(),
        clients,
        Some(Arc::clone(&event_sender)),
        cfg.sync_health_window(),
    );

    event_sender
        .send_or_log(Event::with_data("stockpilot starting".to_string()))
        .await;

    if let Err(e) = seed_demo_catalog(&materials, &edges, &channel_service).await {
        error!("Failed to seed demo catalog: {}", e);
        return Err(e.into());
    }
    run_demo(
        &materials,
        &bom_service,
        &atp_service,
        &movement_service,
        &sync_service,
    )
    .await;

    let cleanup_task = limiter.start_cleanup_task(cfg.sync_interval(), cfg.bucket_idle_purge());
    let scheduler = start_sync_scheduler(sync_service.clone(), cfg.sync_interval());
    info!(
        "Sync scheduler running every {}s; press Ctrl+C to stop",
        cfg.sync_interval_secs
    );

    shutdown_signal().await;

    scheduler.abort();
    cleanup_task.abort();
    drop(event_sender);
    let _ = event_processor.await;

    match serde_json::to_string(&metrics.snapshot()) {
        Ok(snapshot) => info!("Final metrics: {}", snapshot),
        Err(e) => error!("Failed to serialize metrics snapshot: {}", e),
    }
    info!("Shut down cleanly");
    Ok(())
}

/// A laptop assembly with a two-level BOM, mirrored to two channels.
async fn seed_demo_catalog(
    materials: &Arc<InMemoryMaterialRepository>,
    edges: &Arc<InMemoryBomEdgeRepository>,
    channel_service: &ChannelService,
) -> ServiceResult<()> {
    let mut laptop = Material::new("FIN-LAPTOP", "15-inch laptop", "pcs");
    laptop.current_stock = dec!(25);
    laptop.minimum_stock = dec!(10);
    laptop.maximum_stock = dec!(200);
    laptop.average_cost = dec!(850);
    let laptop = materials.save(laptop).await?;

    let mut board = Material::new("SUB-BOARD", "Mainboard", "pcs");
    board.current_stock = dec!(40);
    board.minimum_stock = dec!(20);
    board.average_cost = dec!(310);
    let board = materials.save(board).await?;

    let mut panel = Material::new("RAW-PANEL", "Display panel", "pcs");
    panel.current_stock = dec!(120);
    panel.minimum_stock = dec!(50);
    panel.average_cost = dec!(95);
    let panel = materials.save(panel).await?;

    let mut cell = Material::new("RAW-CELL", "Battery cell", "pcs");
    cell.current_stock = dec!(900);
    cell.minimum_stock = dec!(200);
    cell.average_cost = dec!(4.50);
    let cell = materials.save(cell).await?;

    edges.save(BomEdge::new(laptop.id, board.id, dec!(1))).await?;
    let mut panel_edge = BomEdge::new(laptop.id, panel.id, dec!(1));
    panel_edge.scrap_percentage = dec!(4);
    edges.save(panel_edge).await?;
    let mut cell_edge = BomEdge::new(board.id, cell.id, dec!(6));
    cell_edge.scrap_percentage = dec!(2);
    edges.save(cell_edge).await?;

    let shop = channel_service
        .create_channel(CreateChannelRequest {
            name: "EU Webshop".to_string(),
            code: "shop-eu".to_string(),
            channel_type: ChannelType::Shopify,
            description: None,
            base_url: None,
            webhook_url: None,
            distribution_ratio: Some(60),
        })
        .await?;
    let marketplace = channel_service
        .create_channel(CreateChannelRequest {
            name: "US Marketplace".to_string(),
            code: "market-us".to_string(),
            channel_type: ChannelType::Ebay,
            description: None,
            base_url: None,
            webhook_url: None,
            distribution_ratio: Some(40),
        })
        .await?;

    channel_service
        .save_credential(shop.id, API_KEY_CREDENTIAL, "demo-shop-key")
        .await?;
    channel_service
        .save_credential(marketplace.id, API_KEY_CREDENTIAL, "demo-market-key")
        .await?;

    channel_service
        .create_binding(shop.id, laptop.id, "shopify-variant-1001")
        .await?;
    channel_service
        .create_binding(marketplace.id, laptop.id, "ebay-listing-2002")
        .await?;

    info!("Seeded demo catalog: 4 materials, 3 BOM edges, 2 channels");
    Ok(())
}

/// One pass over the main operations so a fresh checkout shows real output.
async fn run_demo(
    materials: &Arc<InMemoryMaterialRepository>,
    bom: &BomService,
    atp: &AtpService,
    movements: &StockMovementService,
    sync: &SyncService,
) {
    let Ok(Some(laptop)) = materials.get_by_code("FIN-LAPTOP").await else {
        error!("Demo material missing after seeding");
        return;
    };

    match bom.explode_detailed(laptop.id, dec!(10)).await {
        Ok(lines) => {
            info!("BOM explosion for 10 laptops covers {} components", lines.len());
            for line in lines {
                info!(
                    "  {} requires {} (short {})",
                    line.material_code, line.required_quantity, line.shortage
                );
            }
        }
        Err(e) => error!("BOM explosion failed: {}", e),
    }

    match atp.calculate_atp_with_bom(laptop.id, dec!(15)).await {
        Ok(result) => info!(
            "ATP for 15 laptops: {} ({} constraint(s))",
            result.atp_quantity,
            result.constraints.len()
        ),
        Err(e) => error!("ATP check failed: {}", e),
    }

    let mut receipt = RecordMovementRequest::new(laptop.id, MovementType::Inbound, dec!(5));
    receipt.unit_cost = Some(dec!(870));
    receipt.reference = Some("PO-1001".to_string());
    if let Err(e) = movements.record_movement(receipt).await {
        error!("Inbound receipt failed: {}", e);
    }

    match sync.propagate_stock_change(laptop.id, 5).await {
        Ok(synced) => info!("Propagated +5 stock to {} channel(s)", synced),
        Err(e) => error!("Stock propagation failed: {}", e),
    }

    match sync.sync_status().await {
        Ok(report) => info!(
            "Sync status: {:?} ({}/{} channels synced)",
            report.status, report.synced_channels, report.total_channels
        ),
        Err(e) => error!("Sync status failed: {}", e),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
