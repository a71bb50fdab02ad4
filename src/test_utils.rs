pub mod test_helpers {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use crate::cache::CacheKey;
    use crate::deck::{Deck, DeckSource, Rasterization, Rasterizer, Resolution, fit_within};
    use crate::display::{Size, WindowRole};
    use crate::error::{RasterError, ShowError};
    use crate::input::{Key, RawEvent};

    #[derive(Clone, Default)]
    struct FakeDeckConfig {
        pages: usize,
        page_size: (f32, f32),
        failing: HashSet<usize>,
        unreadable: bool,
        gate: Option<flume::Receiver<()>>,
    }

    struct FakeDeckState {
        config: FakeDeckConfig,
        calls: AtomicUsize,
        log: Mutex<Vec<CacheKey>>,
    }

    /// Deck source that paints every page a solid, page-specific colour.
    ///
    /// Clones share state, so a test can keep one handle for assertions and
    /// hand another to the cache.
    #[derive(Clone)]
    pub struct FakeDeck {
        state: Arc<FakeDeckState>,
    }

    /// Holds gated productions until released or dropped
    pub struct Gate {
        tx: Option<flume::Sender<()>>,
    }

    impl Gate {
        /// Let one waiting production through
        pub fn release_one(&self) {
            if let Some(tx) = &self.tx {
                let _ = tx.send(());
            }
        }

        /// Let every production through from now on
        pub fn open(&mut self) {
            self.tx = None;
        }
    }

    impl FakeDeck {
        pub fn new(pages: usize) -> Self {
            Self::from_config(FakeDeckConfig {
                pages,
                page_size: (400.0, 300.0),
                ..FakeDeckConfig::default()
            })
        }

        /// A deck whose page size is `width` x `height`
        pub fn with_page_size(self, width: f32, height: f32) -> Self {
            let mut config = self.state.config.clone();
            config.page_size = (width, height);
            Self::from_config(config)
        }

        /// Rasterizing any of `pages` fails
        pub fn with_failing_pages(self, pages: impl IntoIterator<Item = usize>) -> Self {
            let mut config = self.state.config.clone();
            config.failing.extend(pages);
            Self::from_config(config)
        }

        /// `describe` fails as if the file could not be opened
        pub fn unreadable(self) -> Self {
            let mut config = self.state.config.clone();
            config.unreadable = true;
            Self::from_config(config)
        }

        /// Productions block until the returned gate lets them through
        pub fn gated(self) -> (Self, Gate) {
            let (tx, rx) = flume::unbounded();
            let mut config = self.state.config.clone();
            config.gate = Some(rx);
            (Self::from_config(config), Gate { tx: Some(tx) })
        }

        /// Number of rasterize calls so far
        pub fn calls(&self) -> usize {
            self.state.calls.load(Ordering::SeqCst)
        }

        /// Every rasterize call in order
        pub fn call_log(&self) -> Vec<CacheKey> {
            self.state.log.lock().map(|log| log.clone()).unwrap_or_default()
        }

        pub fn calls_for(&self, key: CacheKey) -> usize {
            self.call_log().iter().filter(|k| **k == key).count()
        }

        pub fn source(&self) -> Arc<dyn DeckSource> {
            Arc::new(self.clone())
        }

        fn from_config(config: FakeDeckConfig) -> Self {
            Self {
                state: Arc::new(FakeDeckState {
                    config,
                    calls: AtomicUsize::new(0),
                    log: Mutex::new(Vec::new()),
                }),
            }
        }
    }

    /// The colour page `page` is painted with
    pub fn color_of(page: usize) -> [u8; 3] {
        let n = (page % 6) as u8;
        [40 * n + 20, 230 - 30 * n, if page % 2 == 0 { 60 } else { 190 }]
    }

    impl DeckSource for FakeDeck {
        fn describe(&self) -> Result<Deck, ShowError> {
            let config = &self.state.config;
            if config.unreadable {
                return Err(ShowError::load("fake.pdf", "unreadable"));
            }
            let sizes = vec![config.page_size; config.pages];
            Ok(Deck::new(sizes, Some("Fake deck".to_string())))
        }

        fn open(&self) -> Result<Box<dyn Rasterizer>, RasterError> {
            Ok(Box::new(FakeRasterizer {
                state: Arc::clone(&self.state),
            }))
        }
    }

    struct FakeRasterizer {
        state: Arc<FakeDeckState>,
    }

    impl Rasterizer for FakeRasterizer {
        fn rasterize(
            &mut self,
            page: usize,
            target: Resolution,
        ) -> Result<Rasterization, RasterError> {
            self.state.calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut log) = self.state.log.lock() {
                log.push(CacheKey::new(page, target));
            }
            let config = &self.state.config;
            if let Some(gate) = &config.gate {
                // A dropped gate opens for good.
                let _ = gate.recv();
            }
            if config.failing.contains(&page) || page >= config.pages {
                return Err(RasterError::generic(format!("page {page} is broken")));
            }

            let (w, h) = config.page_size;
            let (width, height) = fit_within(w / h, target);
            let [r, g, b] = color_of(page);
            let pixels = [r, g, b, 255].repeat(width as usize * height as usize);
            Rasterization::from_rgba(page, target, width, height, pixels)
        }
    }

    /// Builder for scripted input
    pub struct ScenarioBuilder {
        events: Vec<RawEvent>,
    }

    impl Default for ScenarioBuilder {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ScenarioBuilder {
        pub fn new() -> Self {
            Self { events: Vec::new() }
        }

        /// Press and release a key
        pub fn tap(mut self, key: Key) -> Self {
            self.events.push(RawEvent::press(key));
            self.events.push(RawEvent::KeyUp { key });
            self
        }

        /// Next slide (Page Down)
        pub fn next(self) -> Self {
            self.tap(Key::PageDown)
        }

        /// Previous slide (Page Up)
        pub fn previous(self) -> Self {
            self.tap(Key::PageUp)
        }

        pub fn toggle_countdown(self) -> Self {
            self.tap(Key::Char('p'))
        }

        pub fn resize(mut self, role: WindowRole, size: Size) -> Self {
            self.events.push(RawEvent::Resized { role, size });
            self
        }

        pub fn quit(self) -> Self {
            self.tap(Key::Char('q'))
        }

        pub fn build(self) -> Vec<RawEvent> {
            self.events
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_helpers::*;
    use crate::deck::{DeckSource, Resolution};

    #[test]
    fn scenario_builder() {
        let events = ScenarioBuilder::new().next().next().previous().quit().build();
        assert_eq!(events.len(), 8);
    }

    #[test]
    fn fake_deck_paints_and_counts() {
        let deck = FakeDeck::new(3).with_failing_pages([2]);
        let mut rasterizer = deck.open().unwrap();

        let raster = rasterizer.rasterize(1, Resolution::new(80, 80)).unwrap();
        assert_eq!((raster.width, raster.height), (80, 60));
        let [r, g, b] = color_of(1);
        assert_eq!(raster.pixel(0, 0), [r, g, b, 255]);

        assert!(rasterizer.rasterize(2, Resolution::new(80, 80)).is_err());
        assert_eq!(deck.calls(), 2);
        assert_eq!(deck.describe().unwrap().len(), 3);
    }
}
