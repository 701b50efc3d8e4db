use std::{
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};

use async_trait::async_trait;
use futures::future::BoxFuture;
use tower::{BoxError, Service, ServiceBuilder, timeout::Timeout, timeout::error::Elapsed};

use crate::analysis::{AnalysisResult, FramePayload};
use crate::error::AnalysisError;

/// Something that can turn an encoded frame into an [`AnalysisResult`].
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    async fn analyze(&self, frame: &FramePayload) -> Result<AnalysisResult, AnalysisError>;
}

/// Tower adapter around a shared provider. Rejects empty payloads before the call and
/// results that break the record invariants after it.
#[derive(Clone)]
pub struct AnalysisService {
    provider: Arc<dyn AnalysisProvider>,
}

impl AnalysisService {
    pub fn new(provider: Arc<dyn AnalysisProvider>) -> Self {
        Self { provider }
    }

    /// Wraps the service in a timeout layer.
    pub fn with_timeout(provider: Arc<dyn AnalysisProvider>, timeout: Duration) -> TimedAnalysis {
        TimedAnalysis {
            inner: ServiceBuilder::new()
                .timeout(timeout)
                .service(Self::new(provider)),
            timeout,
        }
    }
}

impl Service<FramePayload> for AnalysisService {
    type Response = AnalysisResult;
    type Error = AnalysisError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, frame: FramePayload) -> Self::Future {
        let provider = self.provider.clone();
        Box::pin(async move {
            if frame.is_empty() {
                return Err(AnalysisError::Malformed(format!(
                    "frame {} has an empty payload",
                    frame.id
                )));
            }
            let result = provider.analyze(&frame).await?;
            result.validate()?;
            Ok(result)
        })
    }
}

/// [`AnalysisService`] behind a timeout, with tower's boxed errors mapped back onto
/// [`AnalysisError`].
#[derive(Clone)]
pub struct TimedAnalysis {
    inner: Timeout<AnalysisService>,
    timeout: Duration,
}

impl TimedAnalysis {
    pub async fn analyze(&mut self, frame: FramePayload) -> Result<AnalysisResult, AnalysisError> {
        use tower::ServiceExt;

        let timeout = self.timeout;
        let ready = ServiceExt::<FramePayload>::ready(&mut self.inner)
            .await
            .map_err(|e| classify(e, timeout))?;
        ready.call(frame).await.map_err(|e| classify(e, timeout))
    }
}

fn classify(error: BoxError, timeout: Duration) -> AnalysisError {
    if error.is::<Elapsed>() {
        return AnalysisError::Timeout(timeout);
    }
    match error.downcast::<AnalysisError>() {
        Ok(analysis_error) => *analysis_error,
        Err(other) => AnalysisError::Unavailable(other.to_string()),
    }
}
