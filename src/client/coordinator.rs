use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::{sync::watch, task::JoinHandle};

use super::{CropError, CropRect, CropSource, CroppedImage};

/// 裁剪框变化后等待的时间，期间的新变化会取代旧的
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(150);

#[derive(Clone)]
struct Materialized {
    generation: u64,
    result: Result<CroppedImage, CropError>,
}

/// 裁剪协调器
///
/// 每次裁剪框变化都会重新安排一次裁剪，只保留最后一次请求的结果：
/// 进行中的旧任务被中止，迟到的旧结果被丢弃。
pub struct CropCoordinator {
    source: CropSource,
    debounce: Duration,
    generation: u64,
    latest: Arc<AtomicU64>,
    pending: Option<JoinHandle<()>>,
    tx: watch::Sender<Option<Materialized>>,
}

impl CropCoordinator {
    pub fn new(source: CropSource) -> Self {
        Self::with_debounce(source, DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(source: CropSource, debounce: Duration) -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            source,
            debounce,
            generation: 0,
            latest: Arc::new(AtomicU64::new(0)),
            pending: None,
            tx,
        }
    }

    /// 请求按 `rect` 重新裁剪
    ///
    /// 空矩形或越界矩形在裁剪前即被拒绝，此时之前的请求保持有效。
    /// 必须在 tokio 运行时中调用。
    pub fn request(&mut self, rect: CropRect) -> Result<(), CropError> {
        self.source.check(rect)?;

        self.generation += 1;
        let generation = self.generation;
        self.latest.store(generation, Ordering::SeqCst);

        if let Some(pending) = self.pending.take() {
            pending.abort();
        }

        let source = self.source.clone();
        let latest = self.latest.clone();
        let tx = self.tx.clone();
        let debounce = self.debounce;

        self.pending = Some(tokio::spawn(async move {
            if !debounce.is_zero() {
                tokio::time::sleep(debounce).await;
            }

            let result = tokio::task::spawn_blocking(move || source.materialize(rect))
                .await
                .unwrap_or(Err(CropError::Aborted));

            publish(&tx, &latest, generation, result);
        }));

        tracing::trace!(generation, %rect, "crop scheduled");
        Ok(())
    }

    /// 最近一次已完成裁剪的结果，不等待进行中的任务
    pub fn latest(&self) -> Option<CroppedImage> {
        self.tx
            .borrow()
            .as_ref()
            .and_then(|m| m.result.as_ref().ok().cloned())
    }

    /// 等待最后一次请求的裁剪完成并返回结果
    ///
    /// 返回的图片就是调用时最新裁剪框对应的图片。
    pub async fn save(&self) -> Result<CroppedImage, CropError> {
        if self.generation == 0 {
            return Err(CropError::NothingSelected);
        }

        let target = self.generation;
        let mut rx = self.tx.subscribe();
        let materialized = rx
            .wait_for(|slot| slot.as_ref().is_some_and(|m| m.generation == target))
            .await
            .map_err(|_| CropError::Aborted)?;

        match materialized.as_ref() {
            Some(m) => m.result.clone(),
            None => Err(CropError::Aborted),
        }
    }
}

/// 仅当 `generation` 仍是最新请求时发布结果，返回是否发布
///
/// 旧任务可能在被中止前已越过最后一个等待点，其结果在此被丢弃。
fn publish(
    tx: &watch::Sender<Option<Materialized>>,
    latest: &AtomicU64,
    generation: u64,
    result: Result<CroppedImage, CropError>,
) -> bool {
    tx.send_if_modified(|slot| {
        if latest.load(Ordering::SeqCst) != generation {
            tracing::trace!(generation, "discarding superseded crop");
            return false;
        }
        *slot = Some(Materialized { generation, result });
        true
    })
}

impl Drop for CropCoordinator {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}
