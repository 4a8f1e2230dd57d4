//! Service seams consumed by the enhancement loop.
//!
//! Each capability is its own trait so tests and alternative providers can
//! swap one without the others.

use std::sync::Arc;

use async_trait::async_trait;
use image::RgbImage;

use lumen_models::Critique;

use crate::error::AiResult;

/// Whole-frame creative enhancement.
#[async_trait]
pub trait ImageEnhancer: Send + Sync {
    /// Return an edited frame with the same composition as `image`.
    async fn enhance(&self, image: &RgbImage, instruction: &str) -> AiResult<RgbImage>;
}

/// Quality critique of an edited frame.
#[async_trait]
pub trait ImageCritic: Send + Sync {
    async fn critique(&self, image: &RgbImage) -> AiResult<Critique>;
}

/// Region-constrained edit.
#[async_trait]
pub trait SurgicalEditor: Send + Sync {
    /// Edit only the area described by `region`.
    async fn edit(&self, image: &RgbImage, region: &str, instruction: &str)
        -> AiResult<RgbImage>;
}

/// The three capabilities bundled for the pipeline.
#[derive(Clone)]
pub struct AiServices {
    pub enhancer: Arc<dyn ImageEnhancer>,
    pub critic: Arc<dyn ImageCritic>,
    pub editor: Arc<dyn SurgicalEditor>,
}

impl AiServices {
    pub fn new(
        enhancer: Arc<dyn ImageEnhancer>,
        critic: Arc<dyn ImageCritic>,
        editor: Arc<dyn SurgicalEditor>,
    ) -> Self {
        Self {
            enhancer,
            critic,
            editor,
        }
    }

    /// Use one provider for every capability.
    pub fn from_provider<P>(provider: Arc<P>) -> Self
    where
        P: ImageEnhancer + ImageCritic + SurgicalEditor + 'static,
    {
        Self {
            enhancer: provider.clone(),
            critic: provider.clone(),
            editor: provider,
        }
    }
}

impl std::fmt::Debug for AiServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiServices").finish_non_exhaustive()
    }
}
