//! End-to-end tests for the management frame descriptor pool

use mgmt_txrx::desc_pool::completions_masked;
use mgmt_txrx::error::{Error, Result};
use mgmt_txrx::sim::{self, FrameMeta};
use mgmt_txrx::{Config, DescId, DescPool, MgmtTxRxContext, PsocId};
use std::collections::HashSet;
use std::sync::Arc;

#[test]
fn test_full_capacity_then_exhaustion() -> Result<()> {
    for capacity in [1usize, 3, 17, 512] {
        let pool: DescPool = DescPool::with_capacity("e2e_capacity", capacity)?;

        let ids: HashSet<DescId> = (0..capacity).map(|_| pool.acquire()).collect::<Result<_>>()?;
        assert_eq!(ids.len(), capacity);
        assert!(ids.iter().all(|id| id.index() < capacity));

        match pool.acquire() {
            Err(Error::Exhausted { capacity: c, .. }) => assert_eq!(c, capacity),
            other => panic!("expected exhaustion, got {:?}", other),
        }
    }
    Ok(())
}

#[test]
fn test_release_then_acquire_returns_same_slot() -> Result<()> {
    let pool: DescPool = DescPool::with_capacity("e2e_lifo", 3)?;
    let ids: Vec<DescId> = (0..3).map(|_| pool.acquire()).collect::<Result<_>>()?;

    let middle = ids[1];
    pool.release(middle)?;
    assert_eq!(pool.acquire()?, middle);

    // Most recent release wins when several are pending
    pool.release(ids[0])?;
    pool.release(ids[2])?;
    assert_eq!(pool.acquire()?, ids[2]);
    assert_eq!(pool.acquire()?, ids[0]);
    Ok(())
}

#[test]
fn test_invalid_handles_leave_pool_intact() -> Result<()> {
    let pool: DescPool = DescPool::with_capacity("e2e_invalid", 4)?;
    let before = pool.stats();

    assert!(matches!(
        pool.release(DescId::new(4)),
        Err(Error::InvalidHandle { .. })
    ));
    assert!(matches!(
        pool.release(DescId::new(u32::MAX)),
        Err(Error::InvalidHandle { .. })
    ));
    // Never leased
    assert!(matches!(
        pool.release(DescId::new(0)),
        Err(Error::InvalidHandle { .. })
    ));

    assert_eq!(pool.stats(), before);
    Ok(())
}

#[test]
fn test_uninitialized_pool_rejects_everything() {
    let pool: DescPool = DescPool::new("e2e_uninit");

    assert!(matches!(pool.acquire(), Err(Error::InvalidState(_))));
    assert!(matches!(pool.release(DescId::new(0)), Err(Error::InvalidState(_))));
    assert!(matches!(pool.deinit(), Err(Error::InvalidState(_))));
    assert!(matches!(pool.init(0), Err(Error::InvalidArgument(_))));
    assert!(!pool.is_ready());
    assert_eq!(pool.capacity(), 0);
}

#[test]
fn test_reinit_yields_fresh_pool() -> Result<()> {
    let pool: DescPool<Vec<u8>> = DescPool::with_capacity("e2e_reinit", 2)?;
    pool.acquire_with(vec![0xd0, 0x00])?;
    pool.acquire_with(vec![0xb0, 0x00])?;
    assert!(pool.acquire().unwrap_err().is_exhausted());

    pool.deinit()?;
    pool.init(2)?;

    assert_eq!(pool.free_count(), 2);
    let id = pool.acquire()?;
    assert_eq!(pool.release(id)?, None);
    Ok(())
}

#[test]
fn test_completion_masking_inside_critical_section() -> Result<()> {
    let pool: DescPool = DescPool::with_capacity("e2e_mask", 1)?;
    let id = pool.acquire()?;

    assert!(!completions_masked());
    let masked = pool.with_payload(id, |_| completions_masked())?;
    assert!(masked);
    assert!(!completions_masked());
    Ok(())
}

#[test]
fn test_context_per_psoc() -> Result<()> {
    let config = Config::default();
    let ctx0: MgmtTxRxContext<u16> = MgmtTxRxContext::create(PsocId(0), &config.pool)?;
    let ctx1: MgmtTxRxContext<u16> = MgmtTxRxContext::create(PsocId(1), &config.pool)?;

    let a = ctx0.track_frame(0x0040)?;
    let b = ctx1.track_frame(0x00d0)?;

    // Independent pools hand out the same first id
    assert_eq!(a, b);
    assert_eq!(ctx0.complete_frame(a)?, Some(0x0040));
    assert_eq!(ctx1.complete_frame(b)?, Some(0x00d0));

    ctx0.destroy()?;
    ctx1.destroy()?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_simulation_under_pressure() -> Result<()> {
    let mut config = Config::from_toml_str(
        r#"
        [pool]
        name = "e2e_sim"
        capacity = 4

        [simulation]
        workers = 8
        frames_per_worker = 250
        completion_delay_us = 200
        "#,
    )?;
    config.validate()?;

    let pool: Arc<DescPool<FrameMeta>> =
        Arc::new(DescPool::with_capacity(config.pool.name.clone(), config.pool.capacity)?);
    let report = sim::run(Arc::clone(&pool), &config.simulation).await?;

    assert_eq!(report.submitted + report.dropped, 2000);
    assert_eq!(report.completed, report.submitted);
    assert_eq!(report.mismatched, 0);
    assert!(report.pool.high_watermark <= 4);
    assert_eq!(pool.leased_count(), 0);

    config.pool.capacity = 0;
    assert!(config.validate().is_err());
    Ok(())
}
