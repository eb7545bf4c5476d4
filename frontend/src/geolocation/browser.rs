// frontend/src/geolocation/browser.rs
#![cfg(target_arch = "wasm32")]

use super::{GeoOptions, Geolocator, RawPosition};
use crate::error::LocationError;
use chrono::{DateTime, Utc};
use futures::Stream;
use futures::StreamExt;
use futures_channel::{mpsc, oneshot};
use std::cell::RefCell;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{Geolocation, Position, PositionError, PositionOptions};

/// `navigator.geolocation`
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserGeolocator;

fn geolocation() -> Result<Geolocation, LocationError> {
    let window = web_sys::window().ok_or(LocationError::Unsupported)?;
    let navigator = window.navigator();
    // older engines simply lack the property
    if !js_sys::Reflect::has(&navigator, &"geolocation".into()).unwrap_or(false) {
        return Err(LocationError::Unsupported);
    }
    navigator.geolocation().map_err(|_| LocationError::Unsupported)
}

fn js_options(options: &GeoOptions) -> PositionOptions {
    let opts = PositionOptions::new();
    opts.set_enable_high_accuracy(options.high_accuracy);
    opts.set_timeout(options.timeout.as_millis().min(u32::MAX as u128) as u32);
    opts.set_maximum_age(options.maximum_age.as_millis().min(u32::MAX as u128) as u32);
    opts
}

fn raw_position(pos: &Position) -> RawPosition {
    let coords = pos.coords();
    RawPosition {
        latitude: coords.latitude(),
        longitude: coords.longitude(),
        accuracy: coords.accuracy(),
        timestamp: DateTime::from_timestamp_millis(pos.timestamp() as i64).unwrap_or_else(Utc::now),
    }
}

fn classify(err: &PositionError) -> LocationError {
    LocationError::from_code(err.code())
}

impl Geolocator for BrowserGeolocator {
    type Watch = BrowserWatch;

    fn is_supported(&self) -> bool {
        geolocation().is_ok()
    }

    async fn current_position(&self, options: &GeoOptions) -> Result<RawPosition, LocationError> {
        let geo = geolocation()?;

        let (tx, rx) = oneshot::channel::<Result<RawPosition, LocationError>>();
        let tx = Rc::new(RefCell::new(Some(tx)));

        let ok_tx = tx.clone();
        let on_ok = Closure::once(move |pos: Position| {
            if let Some(tx) = ok_tx.borrow_mut().take() {
                let _ = tx.send(Ok(raw_position(&pos)));
            }
        });
        let err_tx = tx.clone();
        let on_err = Closure::once(move |err: PositionError| {
            if let Some(tx) = err_tx.borrow_mut().take() {
                let _ = tx.send(Err(classify(&err)));
            }
        });

        geo.get_current_position_with_error_callback_and_options(
            on_ok.as_ref().unchecked_ref(),
            Some(on_err.as_ref().unchecked_ref()),
            &js_options(options),
        )
        .map_err(|_| LocationError::Unknown)?;

        // closures must stay alive until the browser calls one of them
        let result = rx.await.unwrap_or(Err(LocationError::Unknown));
        drop((on_ok, on_err));
        result
    }

    fn watch_position(&self, options: &GeoOptions) -> Result<BrowserWatch, LocationError> {
        let geo = geolocation()?;
        let (tx, rx) = mpsc::unbounded();

        let ok_tx = tx.clone();
        let on_ok = Closure::wrap(Box::new(move |pos: Position| {
            let _ = ok_tx.unbounded_send(Ok(raw_position(&pos)));
        }) as Box<dyn FnMut(Position)>);
        let on_err = Closure::wrap(Box::new(move |err: PositionError| {
            let _ = tx.unbounded_send(Err(classify(&err)));
        }) as Box<dyn FnMut(PositionError)>);

        let id = geo
            .watch_position_with_error_callback_and_options(
                on_ok.as_ref().unchecked_ref(),
                Some(on_err.as_ref().unchecked_ref()),
                &js_options(options),
            )
            .map_err(|_| LocationError::Unknown)?;

        Ok(BrowserWatch {
            id,
            rx,
            _on_ok: on_ok,
            _on_err: on_err,
        })
    }
}

/// Live `watchPosition` subscription; `clearWatch` runs on drop.
pub struct BrowserWatch {
    id: i32,
    rx: mpsc::UnboundedReceiver<Result<RawPosition, LocationError>>,
    _on_ok: Closure<dyn FnMut(Position)>,
    _on_err: Closure<dyn FnMut(PositionError)>,
}

impl Stream for BrowserWatch {
    type Item = Result<RawPosition, LocationError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_next_unpin(cx)
    }
}

impl Drop for BrowserWatch {
    fn drop(&mut self) {
        if let Ok(geo) = geolocation() {
            geo.clear_watch(self.id);
        }
    }
}
