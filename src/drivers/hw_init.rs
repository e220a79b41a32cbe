//! One-shot hardware peripheral initialization.
//!
//! Configures ADC channels, GPIO directions, and the LEDC timer/channel
//! using raw ESP-IDF sys calls.  Called once from `main()` before either
//! task starts.
//!
//! On the host every accessor is backed by static atomics so the simulation
//! binary and tests can inject readings and observe outputs.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    GpioConfigFailed(i32),
    LedcInitFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::LedcInitFailed(rc) => write!(f, "LEDC timer/channel config failed (rc={})", rc),
        }
    }
}

impl std::error::Error for HwInitError {}

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::pins;

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before any task is spawned.
    unsafe {
        init_adc()?;
        init_gpio()?;
        init_ledc()?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── ADC (oneshot) ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

/// SAFETY: ADC1_HANDLE is written once in `init_adc()` before any reader
/// exists; afterwards it is only read.
#[cfg(target_os = "espidf")]
unsafe fn adc1_handle() -> adc_oneshot_unit_handle_t {
    unsafe { ADC1_HANDLE }
}

#[cfg(target_os = "espidf")]
unsafe fn init_adc() -> Result<(), HwInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };

    for channel in [pins::ADC1_CH_PULSE_WIDTH, pins::ADC1_CH_OFF_TIME, pins::ADC1_CH_TEMP] {
        let ret = unsafe { adc_oneshot_config_channel(adc1_handle(), channel, &chan_cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::AdcInitFailed(ret));
        }
    }

    info!("hw_init: ADC1 configured (CH3=width, CH4=off, CH8=temp)");
    Ok(())
}

/// One 12-bit conversion.  `None` when the driver reports an error.
#[cfg(target_os = "espidf")]
pub fn adc1_read(channel: u32) -> Option<u16> {
    let mut raw: i32 = 0;
    // SAFETY: adc1_handle() contract; oneshot reads are serialised by the
    // driver's internal lock.
    let ret = unsafe { adc_oneshot_read(adc1_handle(), channel, &mut raw) };
    if ret != ESP_OK as i32 {
        return None;
    }
    Some(raw.max(0) as u16)
}

// ── GPIO ──────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio() -> Result<(), HwInitError> {
    let enable_cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pins::ENABLE_SWITCH_GPIO,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    let ret = unsafe { gpio_config(&enable_cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }

    let output_cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pins::PULSE_OUTPUT_GPIO,
        mode: gpio_mode_t_GPIO_MODE_OUTPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_ENABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    let ret = unsafe { gpio_config(&output_cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }
    // Output starts deasserted.
    unsafe { gpio_set_level(pins::PULSE_OUTPUT_GPIO, 0) };

    info!("hw_init: GPIO configured (enable=in, pulse=out low)");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: read-only register access on an already-configured input pin.
    (unsafe { gpio_get_level(pin) }) != 0
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) -> bool {
    // SAFETY: pin was configured as output in init_gpio(); only the main
    // task writes it.
    (unsafe { gpio_set_level(pin, u32::from(high)) }) == ESP_OK as i32
}

// ── LEDC PWM ─────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_ledc() -> Result<(), HwInitError> {
    let timer = ledc_timer_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        timer_num: ledc_timer_t_LEDC_TIMER_0,
        duty_resolution: ledc_timer_bit_t_LEDC_TIMER_13_BIT,
        freq_hz: pins::LED_PWM_FREQ_HZ,
        clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
        ..Default::default()
    };
    let ret = unsafe { ledc_timer_config(&timer) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::LedcInitFailed(ret));
    }

    let ret = unsafe {
        ledc_channel_config(&ledc_channel_config_t {
            speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
            channel: pins::LEDC_CH_STATUS,
            timer_sel: ledc_timer_t_LEDC_TIMER_0,
            gpio_num: pins::STATUS_LED_GPIO,
            duty: 0,
            hpoint: 0,
            ..Default::default()
        })
    };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::LedcInitFailed(ret));
    }

    info!("hw_init: LEDC configured (status=CH0, 13-bit @ 5 kHz)");
    Ok(())
}

/// Maximum duty value accepted by `ledc_set` at the configured resolution.
pub const LEDC_MAX_DUTY: u16 = (1u16 << crate::pins::LED_PWM_RESOLUTION_BITS) - 1;

#[cfg(target_os = "espidf")]
pub fn ledc_set(channel: u32, duty: u16) -> bool {
    // SAFETY: channel configured in init_ledc(); callers serialise through
    // the indicator mutex.
    unsafe {
        ledc_set_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel, u32::from(duty)) == ESP_OK as i32
            && ledc_update_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel) == ESP_OK as i32
    }
}

// ── Host simulation backend ──────────────────────────────────

#[cfg(not(target_os = "espidf"))]
static SIM_ADC: [AtomicU16; 3] = [AtomicU16::new(2048), AtomicU16::new(2048), AtomicU16::new(1900)];
#[cfg(not(target_os = "espidf"))]
static SIM_ENABLE_LEVEL: AtomicBool = AtomicBool::new(true);
#[cfg(not(target_os = "espidf"))]
static SIM_OUTPUT_LEVEL: AtomicBool = AtomicBool::new(false);
#[cfg(not(target_os = "espidf"))]
static SIM_LED_DUTY: AtomicU32 = AtomicU32::new(0);

#[cfg(not(target_os = "espidf"))]
fn sim_adc_slot(channel: u32) -> Option<&'static AtomicU16> {
    match channel {
        crate::pins::ADC1_CH_PULSE_WIDTH => Some(&SIM_ADC[0]),
        crate::pins::ADC1_CH_OFF_TIME => Some(&SIM_ADC[1]),
        crate::pins::ADC1_CH_TEMP => Some(&SIM_ADC[2]),
        _ => None,
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn adc1_read(channel: u32) -> Option<u16> {
    sim_adc_slot(channel).map(|slot| slot.load(Ordering::Relaxed))
}

/// Inject a 12-bit reading for one simulated ADC channel.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_adc(channel: u32, raw: u16) {
    if let Some(slot) = sim_adc_slot(channel) {
        slot.store(raw.min(4095), Ordering::Relaxed);
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(pin: i32) -> bool {
    if pin == crate::pins::ENABLE_SWITCH_GPIO {
        SIM_ENABLE_LEVEL.load(Ordering::Relaxed)
    } else {
        false
    }
}

/// Drive the simulated enable input level (pull-up idle = HIGH).
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_enable_level(high: bool) {
    SIM_ENABLE_LEVEL.store(high, Ordering::Relaxed);
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(pin: i32, high: bool) -> bool {
    if pin == crate::pins::PULSE_OUTPUT_GPIO {
        SIM_OUTPUT_LEVEL.store(high, Ordering::Relaxed);
    }
    true
}

#[cfg(not(target_os = "espidf"))]
pub fn sim_output_level() -> bool {
    SIM_OUTPUT_LEVEL.load(Ordering::Relaxed)
}

#[cfg(not(target_os = "espidf"))]
pub fn ledc_set(channel: u32, duty: u16) -> bool {
    if channel == crate::pins::LEDC_CH_STATUS {
        SIM_LED_DUTY.store(u32::from(duty), Ordering::Relaxed);
    }
    true
}

#[cfg(not(target_os = "espidf"))]
pub fn sim_led_duty() -> u16 {
    SIM_LED_DUTY.load(Ordering::Relaxed) as u16
}
