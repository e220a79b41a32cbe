//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`]: the controller configuration is stored as a
//! single postcard blob under `pulsectl/ctrlcfg`.
//!
//! - Validation: every field is range-checked before persistence and after
//!   loading; an invalid stored blob is reported, never silently clamped.
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`.
//! - On the host an in-memory buffer stands in for flash.

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::ControllerConfig;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
const CONFIG_NAMESPACE: &[u8] = b"pulsectl\0";
#[cfg(target_os = "espidf")]
const CONFIG_KEY: &[u8] = b"ctrlcfg\0";
#[cfg(target_os = "espidf")]
const MAX_BLOB_SIZE: usize = 512;

pub struct NvsConfigStore {
    #[cfg(not(target_os = "espidf"))]
    blob: Option<Vec<u8>>,
}

impl NvsConfigStore {
    /// Initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the partition is erased
    /// and re-initialised.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from main() before any task touches NVS.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES as i32 || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as i32 {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK as i32 {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK as i32 {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK as i32 {
                return Err(ConfigError::IoError);
            }
            info!("NvsConfigStore: ESP-IDF NVS initialised");
            Ok(Self {})
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("NvsConfigStore: simulation backend");
            Ok(Self { blob: None })
        }
    }

    /// Simulation store pre-loaded with raw bytes.
    #[cfg(not(target_os = "espidf"))]
    pub fn with_blob(bytes: Vec<u8>) -> Self {
        Self { blob: Some(bytes) }
    }

    /// Open the config namespace, run `f` with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        // SAFETY: namespace is a static null-terminated string.
        let ret = unsafe { nvs_open(CONFIG_NAMESPACE.as_ptr().cast(), mode, &mut handle) };
        if ret != ESP_OK as i32 {
            return Err(ret);
        }
        let result = f(handle);
        // SAFETY: handle was opened above and is closed exactly once.
        unsafe { nvs_close(handle) };
        result
    }

    #[cfg(target_os = "espidf")]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        let result = Self::with_nvs_handle(false, |handle| {
            let mut size: usize = 0;
            // SAFETY: size query with a null buffer, then a sized read.
            let ret = unsafe {
                nvs_get_blob(handle, CONFIG_KEY.as_ptr().cast(), core::ptr::null_mut(), &mut size)
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH as i32);
            }
            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(handle, CONFIG_KEY.as_ptr().cast(), buf.as_mut_ptr().cast(), &mut size)
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            Ok(buf)
        });
        match result {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND as i32 => Ok(None),
            Err(e) => {
                warn!("NvsConfigStore: NVS read error {}", e);
                Err(ConfigError::IoError)
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        Ok(self.blob.clone())
    }

    #[cfg(target_os = "espidf")]
    fn write_blob(&mut self, bytes: Vec<u8>) -> Result<(), ConfigError> {
        let result = Self::with_nvs_handle(true, |handle| {
            // SAFETY: key is static and null-terminated; bytes outlive the call.
            let ret = unsafe {
                nvs_set_blob(handle, CONFIG_KEY.as_ptr().cast(), bytes.as_ptr().cast(), bytes.len())
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            Ok(())
        });
        result.map_err(|e| {
            warn!("NvsConfigStore: NVS write error {}", e);
            ConfigError::IoError
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_blob(&mut self, bytes: Vec<u8>) -> Result<(), ConfigError> {
        self.blob = Some(bytes);
        Ok(())
    }
}

impl ConfigPort for NvsConfigStore {
    fn read_config(&self) -> Result<ControllerConfig, ConfigError> {
        match self.read_blob()? {
            Some(bytes) => {
                let cfg: ControllerConfig =
                    postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
                cfg.validate().map_err(ConfigError::ValidationFailed)?;
                info!("NvsConfigStore: loaded config ({} bytes)", bytes.len());
                Ok(cfg)
            }
            None => {
                info!("NvsConfigStore: no stored config, using defaults");
                Ok(ControllerConfig::default())
            }
        }
    }

    fn write_config(&mut self, config: &ControllerConfig) -> Result<(), ConfigError> {
        config.validate().map_err(ConfigError::ValidationFailed)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        let len = bytes.len();
        self.write_blob(bytes)?;
        info!("NvsConfigStore: config saved ({} bytes)", len);
        Ok(())
    }
}
