//! 동시 실행 수가 제한된 태스크 풀.
//!
//! 작업마다 `tokio::spawn`으로 태스크를 만들고 `buffer_unordered`로 동시 실행 수를 제한합니다.
//! 태스크가 실패하거나 패닉해도 해당 작업의 결과만 `Err`가 되고 나머지 작업은 계속됩니다.
//! 결과는 완료 순서대로 스트림에 나오며, 소비자 하나가 순차적으로 처리합니다.

use futures::stream::{self, Stream, StreamExt};
use std::future::Future;

use crate::error::CollectorError;
use crate::Result;

/// 작업 목록을 제한된 동시 실행 수로 수행.
///
/// 반환 스트림은 `(작업 키, 결과)`를 완료 순서대로 내보냅니다.
pub fn spawn_bounded<K, T, F, Fut>(
    keys: Vec<K>,
    workers: usize,
    task: F,
) -> impl Stream<Item = (K, Result<T>)>
where
    K: Clone + Send + 'static,
    T: Send + 'static,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    stream::iter(keys)
        .map(move |key| {
            let handle = tokio::spawn(task(key.clone()));
            async move {
                let result = match handle.await {
                    Ok(result) => result,
                    Err(e) => Err(CollectorError::from(e)),
                };
                (key, result)
            }
        })
        .buffer_unordered(workers.max(1))
}
