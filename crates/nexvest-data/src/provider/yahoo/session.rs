//! 프로세스 전역 공유 세션 (단일 갱신 보장).
//!
//! 핸드셰이크 비용이 큰 소스를 위해 세션을 한 번만 만들고 모든 태스크가 재사용합니다.
//! 인증이 만료되면 세션을 통째로 교체하는데, 여러 태스크가 동시에 만료를 감지해도
//! 갱신은 한 번만 일어나고 나머지는 그 결과를 기다려 사용합니다.
//!
//! ```text
//! NO_SESSION ──acquire──▶ HANDSHAKING ──▶ READY(gen n)
//!                                           │ 401/403
//!                                           ▼
//!                         renew(gen n) ──▶ READY(gen n+1)
//!                         renew(gen n) ──▶ (이미 n+1이면 그대로 반환)
//! ```

use async_trait::async_trait;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::Result;

/// 인증 세션을 새로 수립하는 핸드셰이크.
#[async_trait]
pub trait SessionHandshake: Send + Sync + 'static {
    type Session: Send + Sync + 'static;

    async fn handshake(&self) -> Result<Self::Session>;
}

/// 특정 세대의 세션 참조.
pub struct SessionLease<S> {
    generation: u64,
    session: Arc<S>,
}

impl<S> SessionLease<S> {
    /// 세션 세대 (1부터 시작, 갱신마다 증가).
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl<S> Clone for SessionLease<S> {
    fn clone(&self) -> Self {
        Self {
            generation: self.generation,
            session: Arc::clone(&self.session),
        }
    }
}

impl<S> Deref for SessionLease<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.session
    }
}

/// 지연 생성되고 단일 갱신되는 공유 세션.
pub struct SharedSession<H: SessionHandshake> {
    handshaker: H,
    slot: Mutex<Option<SessionLease<H::Session>>>,
    handshakes: AtomicU64,
}

impl<H: SessionHandshake> SharedSession<H> {
    pub fn new(handshaker: H) -> Self {
        Self {
            handshaker,
            slot: Mutex::new(None),
            handshakes: AtomicU64::new(0),
        }
    }

    pub fn handshaker(&self) -> &H {
        &self.handshaker
    }

    /// 현재 세션 반환. 없으면 핸드셰이크 후 저장.
    pub async fn acquire(&self) -> Result<SessionLease<H::Session>> {
        let mut slot = self.slot.lock().await;
        if let Some(lease) = slot.as_ref() {
            return Ok(lease.clone());
        }

        let lease = self.establish(0).await?;
        *slot = Some(lease.clone());
        Ok(lease)
    }

    /// 만료된 세션 교체.
    ///
    /// `stale`보다 새로운 세션이 이미 있으면 핸드셰이크 없이 그 세션을 반환합니다.
    pub async fn renew(&self, stale: &SessionLease<H::Session>) -> Result<SessionLease<H::Session>> {
        let mut slot = self.slot.lock().await;
        if let Some(current) = slot.as_ref() {
            if current.generation != stale.generation {
                return Ok(current.clone());
            }
        }

        let lease = self.establish(stale.generation).await?;
        info!(generation = lease.generation, "세션 갱신 완료");
        *slot = Some(lease.clone());
        Ok(lease)
    }

    /// 지금까지 수행된 핸드셰이크 횟수.
    pub fn handshake_count(&self) -> u64 {
        self.handshakes.load(Ordering::SeqCst)
    }

    async fn establish(&self, previous_generation: u64) -> Result<SessionLease<H::Session>> {
        let session = self.handshaker.handshake().await?;
        self.handshakes.fetch_add(1, Ordering::SeqCst);
        Ok(SessionLease {
            generation: previous_generation + 1,
            session: Arc::new(session),
        })
    }
}
