//! In-process fakes for the AI service traits.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{imageops, imageops::FilterType, RgbImage};

use lumen_ai::{AiError, AiResult, AiServices, ImageCritic, ImageEnhancer, SurgicalEditor};
use lumen_models::{Critique, CritiqueIssue};

/// Scripted outcome of one fake call.
#[derive(Debug, Clone)]
pub enum Reply<T> {
    Ok(T),
    Transient,
    Malformed,
    Rejected,
}

impl<T> Reply<T> {
    fn into_result(self) -> AiResult<T> {
        match self {
            Reply::Ok(v) => Ok(v),
            Reply::Transient => Err(AiError::ServiceUnavailable("503".to_string())),
            Reply::Malformed => Err(AiError::malformed("not json")),
            Reply::Rejected => Err(AiError::Http {
                status: 400,
                body: "bad request".to_string(),
            }),
        }
    }
}

/// Pops scripted replies; repeats `fallback` once the script runs out.
struct Script<T> {
    queue: Mutex<VecDeque<Reply<T>>>,
    fallback: Reply<T>,
}

impl<T: Clone> Script<T> {
    fn new(script: Vec<Reply<T>>, fallback: Reply<T>) -> Self {
        Self {
            queue: Mutex::new(script.into()),
            fallback,
        }
    }

    fn next(&self) -> Reply<T> {
        let mut queue = self.queue.lock().unwrap();
        queue.pop_front().unwrap_or_else(|| self.fallback.clone())
    }
}

/// Lifts every channel by `step` per call, so successive passes are distinguishable.
pub struct FakeEnhancer {
    step: u8,
    failures: Script<()>,
    /// Output size override, to simulate composition-breaking edits
    resize_to: Option<(u32, u32)>,
    pub calls: AtomicUsize,
}

impl FakeEnhancer {
    pub fn brighten(step: u8) -> Self {
        Self {
            step,
            failures: Script::new(Vec::new(), Reply::Ok(())),
            resize_to: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Play `script` (Ok(()) means "succeed") before succeeding forever.
    pub fn with_failures(mut self, script: Vec<Reply<()>>) -> Self {
        self.failures = Script::new(script, Reply::Ok(()));
        self
    }

    pub fn always(reply: Reply<()>) -> Self {
        Self {
            failures: Script::new(Vec::new(), reply),
            ..Self::brighten(10)
        }
    }

    pub fn resizing(mut self, width: u32, height: u32) -> Self {
        self.resize_to = Some((width, height));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn brighten(image: &RgbImage, step: u8) -> RgbImage {
    let mut out = image.clone();
    for px in out.pixels_mut() {
        for c in px.0.iter_mut() {
            *c = c.saturating_add(step);
        }
    }
    out
}

#[async_trait]
impl ImageEnhancer for FakeEnhancer {
    async fn enhance(&self, image: &RgbImage, _instruction: &str) -> AiResult<RgbImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.failures.next().into_result()?;
        let out = brighten(image, self.step);
        Ok(match self.resize_to {
            Some((w, h)) => imageops::resize(&out, w, h, FilterType::Triangle),
            None => out,
        })
    }
}

/// Returns scripted critiques.
pub struct FakeCritic {
    script: Script<Critique>,
    pub calls: AtomicUsize,
}

impl FakeCritic {
    pub fn always(critique: Critique) -> Self {
        Self::scripted(Vec::new(), Reply::Ok(critique))
    }

    pub fn scripted(script: Vec<Reply<Critique>>, fallback: Reply<Critique>) -> Self {
        Self {
            script: Script::new(script, fallback),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageCritic for FakeCritic {
    async fn critique(&self, _image: &RgbImage) -> AiResult<Critique> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script.next().into_result()
    }
}

/// Paints the top-left pixel white, standing in for a local fix.
pub struct FakeEditor {
    failures: Script<()>,
    pub calls: AtomicUsize,
    pub regions: Mutex<Vec<String>>,
}

impl FakeEditor {
    pub fn new() -> Self {
        Self::scripted(Vec::new())
    }

    pub fn scripted(script: Vec<Reply<()>>) -> Self {
        Self {
            failures: Script::new(script, Reply::Ok(())),
            calls: AtomicUsize::new(0),
            regions: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SurgicalEditor for FakeEditor {
    async fn edit(&self, image: &RgbImage, region: &str, _instruction: &str) -> AiResult<RgbImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.regions.lock().unwrap().push(region.to_string());
        self.failures.next().into_result()?;
        let mut out = image.clone();
        if out.width() > 0 && out.height() > 0 {
            out.put_pixel(0, 0, image::Rgb([255, 255, 255]));
        }
        Ok(out)
    }
}

/// Fakes plus the bundle handed to the code under test.
pub struct Fakes {
    pub enhancer: Arc<FakeEnhancer>,
    pub critic: Arc<FakeCritic>,
    pub editor: Arc<FakeEditor>,
}

impl Fakes {
    pub fn new(enhancer: FakeEnhancer, critic: FakeCritic, editor: FakeEditor) -> Self {
        Self {
            enhancer: Arc::new(enhancer),
            critic: Arc::new(critic),
            editor: Arc::new(editor),
        }
    }

    /// Brightening enhancer, satisfied critic.
    pub fn satisfied() -> Self {
        Self::new(
            FakeEnhancer::brighten(20),
            FakeCritic::always(Critique::clean(9.0)),
            FakeEditor::new(),
        )
    }

    pub fn services(&self) -> AiServices {
        AiServices::new(
            self.enhancer.clone(),
            self.critic.clone(),
            self.editor.clone(),
        )
    }
}

pub fn low_global() -> Critique {
    Critique::new(3.0, vec![CritiqueIssue::global("flat, muddy colours")])
}

pub fn low_surgical(region: &str) -> Critique {
    Critique::new(5.0, vec![CritiqueIssue::surgical("warped detail", region)])
}
