//! BLE transport adapter.
//!
//! Implements [`TransportPort`] — the hexagonal boundary for the
//! advertising/GATT host stack — and bridges stack callbacks into the
//! serial [`StackEvent`] stream the dispatcher consumes.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: Bluedroid GATT server via `esp_idf_svc::sys`.
//! - **all other targets**: simulation stubs for host-side tests.
//!
//! ## GATT layout
//!
//! | Characteristic | UUID   | Perms        |
//! |----------------|--------|--------------|
//! | Temperature    | 0x2A6E | Read+Notify  |
//! | Digital out    | 0x2A56 | Write        |
//!
//! Bluedroid callbacks are C function pointers running in the Bluedroid
//! task; they cannot capture Rust closures and must not touch domain
//! state.  They translate each stack event into a [`StackEvent`] and push
//! it onto a mutex-guarded fixed-capacity queue; the main loop is the
//! single consumer.  Attribute handles assigned by the stack at
//! registration time are kept in atomics and mapped to the static
//! [`gatt`] table identifiers before events cross the boundary.

use log::info;

use crate::app::ports::{AdvSetHandle, TransportPort};
use crate::error::TransportError;
use crate::events::{ConnHandle, StackEvent};
#[cfg(target_os = "espidf")]
use crate::gatt;
use crate::gatt::CharHandle;

// ───────────────────────────────────────────────────────────────
// ESP-IDF static bridge state
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
static BLE_GATTS_IF: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_SVC_ENV_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_SVC_AIO_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_TEMP_CHAR_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_TEMP_CCCD_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_DIGITAL_CHAR_HANDLE: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_CHAR_STEP: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_READ_TRANS_ID: AtomicU32 = AtomicU32::new(0);
#[cfg(target_os = "espidf")]
static BLE_WRITE_TRANS_ID: AtomicU32 = AtomicU32::new(0);

/// Queue bridging the Bluedroid task to the main loop.  Callbacks run in a
/// plain FreeRTOS task (not ISR), so a std Mutex is safe there.
#[cfg(target_os = "espidf")]
static BLE_EVENT_QUEUE: std::sync::Mutex<heapless::Deque<StackEvent, 16>> =
    std::sync::Mutex::new(heapless::Deque::new());

#[cfg(target_os = "espidf")]
fn push_stack_event(event: StackEvent) {
    if let Ok(mut q) = BLE_EVENT_QUEUE.lock() {
        if q.push_back(event).is_err() {
            log::warn!("ble: event queue full, stack event dropped");
        }
    }
}

/// Pop the next pending stack event.  Called from the main loop only.
#[cfg(target_os = "espidf")]
pub fn poll_stack_event() -> Option<StackEvent> {
    BLE_EVENT_QUEUE.lock().ok().and_then(|mut q| q.pop_front())
}

#[cfg(not(target_os = "espidf"))]
pub fn poll_stack_event() -> Option<StackEvent> {
    None
}

// ───────────────────────────────────────────────────────────────
// Bluedroid callbacks (espidf only)
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
fn uuid16_to_esp(uuid: u16) -> esp_bt_uuid_t {
    let mut t: esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = 2;
    t.uuid.uuid16 = uuid;
    t
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gap_event_handler(
    event: esp_gap_ble_cb_event_t,
    _param: *mut esp_ble_gap_cb_param_t,
) {
    match event {
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_START_COMPLETE_EVT => {
            log::info!("ble GAP: advertising started");
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_STOP_COMPLETE_EVT => {
            log::info!("ble GAP: advertising stopped");
        }
        _ => {}
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gatts_event_handler(
    event: esp_gatts_cb_event_t,
    gatts_if: esp_gatt_if_t,
    param: *mut esp_ble_gatts_cb_param_t,
) {
    BLE_GATTS_IF.store(gatts_if as u32, AtomicOrdering::Relaxed);

    match event {
        esp_gatts_cb_event_t_ESP_GATTS_REG_EVT => {
            log::info!("ble GATTS: app registered (if={})", gatts_if);
            let mut svc_id = esp_gatt_srvc_id_t {
                id: esp_gatt_id_t {
                    uuid: uuid16_to_esp(gatt::SVC_ENVIRONMENTAL_SENSING),
                    inst_id: 0,
                },
                is_primary: true,
            };
            // SAFETY: registration sequence runs serially in the Bluedroid task.
            unsafe {
                esp_ble_gatts_create_service(gatts_if, &mut svc_id, 8);
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_CREATE_EVT => {
            // SAFETY: param is valid for the duration of the callback.
            let p = unsafe { &(*param).create };
            let svc_handle = p.service_handle;
            let uuid16 = unsafe { p.service_id.id.uuid.uuid.uuid16 };
            unsafe {
                esp_ble_gatts_start_service(svc_handle);
            }

            if uuid16 == gatt::SVC_ENVIRONMENTAL_SENSING {
                BLE_SVC_ENV_HANDLE.store(svc_handle as u32, AtomicOrdering::Relaxed);
                BLE_CHAR_STEP.store(1, AtomicOrdering::Relaxed);
                let mut uuid = uuid16_to_esp(gatt::UUID_TEMPERATURE);
                unsafe {
                    esp_ble_gatts_add_char(
                        svc_handle,
                        &mut uuid,
                        ESP_GATT_PERM_READ as esp_gatt_perm_t,
                        (ESP_GATT_CHAR_PROP_BIT_READ | ESP_GATT_CHAR_PROP_BIT_NOTIFY)
                            as esp_gatt_char_prop_t,
                        core::ptr::null_mut(),
                        core::ptr::null_mut(),
                    );
                }
            } else if uuid16 == gatt::SVC_AUTOMATION_IO {
                BLE_SVC_AIO_HANDLE.store(svc_handle as u32, AtomicOrdering::Relaxed);
                BLE_CHAR_STEP.store(3, AtomicOrdering::Relaxed);
                let mut uuid = uuid16_to_esp(gatt::UUID_DIGITAL);
                unsafe {
                    esp_ble_gatts_add_char(
                        svc_handle,
                        &mut uuid,
                        ESP_GATT_PERM_WRITE as esp_gatt_perm_t,
                        ESP_GATT_CHAR_PROP_BIT_WRITE as esp_gatt_char_prop_t,
                        core::ptr::null_mut(),
                        core::ptr::null_mut(),
                    );
                }
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_EVT => {
            let p = unsafe { &(*param).add_char };
            let handle = p.attr_handle;
            match BLE_CHAR_STEP.load(AtomicOrdering::Relaxed) {
                1 => {
                    BLE_TEMP_CHAR_HANDLE.store(handle as u32, AtomicOrdering::Relaxed);
                    BLE_CHAR_STEP.store(2, AtomicOrdering::Relaxed);
                    // Client-configuration descriptor for notifications.
                    let mut cccd = uuid16_to_esp(ESP_GATT_UUID_CHAR_CLIENT_CONFIG as u16);
                    unsafe {
                        esp_ble_gatts_add_char_descr(
                            BLE_SVC_ENV_HANDLE.load(AtomicOrdering::Relaxed) as u16,
                            &mut cccd,
                            (ESP_GATT_PERM_READ | ESP_GATT_PERM_WRITE) as esp_gatt_perm_t,
                            core::ptr::null_mut(),
                            core::ptr::null_mut(),
                        );
                    }
                }
                3 => {
                    BLE_DIGITAL_CHAR_HANDLE.store(handle as u32, AtomicOrdering::Relaxed);
                    BLE_CHAR_STEP.store(4, AtomicOrdering::Relaxed);
                    log::info!("ble GATTS: attribute table complete");
                    // The radio and the table are ready — this is the boot
                    // event the dispatcher waits for.
                    push_stack_event(StackEvent::Boot);
                }
                _ => {}
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_DESCR_EVT => {
            let p = unsafe { &(*param).add_char_descr };
            if BLE_CHAR_STEP.load(AtomicOrdering::Relaxed) == 2 {
                BLE_TEMP_CCCD_HANDLE.store(p.attr_handle as u32, AtomicOrdering::Relaxed);
                // Second service: Automation IO with the digital out.
                let mut svc_id = esp_gatt_srvc_id_t {
                    id: esp_gatt_id_t {
                        uuid: uuid16_to_esp(gatt::SVC_AUTOMATION_IO),
                        inst_id: 0,
                    },
                    is_primary: true,
                };
                unsafe {
                    esp_ble_gatts_create_service(gatts_if, &mut svc_id, 4);
                }
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_CONNECT_EVT => {
            let p = unsafe { &(*param).connect };
            push_stack_event(StackEvent::ConnectionOpened {
                connection: p.conn_id as ConnHandle,
            });
        }
        esp_gatts_cb_event_t_ESP_GATTS_DISCONNECT_EVT => {
            let p = unsafe { &(*param).disconnect };
            push_stack_event(StackEvent::ConnectionClosed {
                connection: p.conn_id as ConnHandle,
                reason: p.reason as u16,
            });
        }
        esp_gatts_cb_event_t_ESP_GATTS_READ_EVT => {
            let p = unsafe { &(*param).read };
            if p.handle as u32 == BLE_TEMP_CHAR_HANDLE.load(AtomicOrdering::Relaxed) {
                BLE_READ_TRANS_ID.store(p.trans_id, AtomicOrdering::Relaxed);
                push_stack_event(StackEvent::ReadRequest {
                    connection: p.conn_id as ConnHandle,
                    characteristic: gatt::CHAR_TEMPERATURE,
                });
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_WRITE_EVT => {
            let p = unsafe { &(*param).write };
            let handle = p.handle as u32;
            let data = unsafe { core::slice::from_raw_parts(p.value, p.len as usize) };

            if handle == BLE_TEMP_CCCD_HANDLE.load(AtomicOrdering::Relaxed) {
                let client_config = if data.len() >= 2 {
                    u16::from_le_bytes([data[0], data[1]])
                } else {
                    0
                };
                push_stack_event(StackEvent::CharacteristicStatus {
                    connection: p.conn_id as ConnHandle,
                    characteristic: gatt::CHAR_TEMPERATURE,
                    status_flags: gatt::STATUS_CLIENT_CONFIG,
                    client_config,
                });
                // CCCD writes are acknowledged directly; they never reach
                // the application's write path.
                if p.need_rsp {
                    unsafe {
                        esp_ble_gatts_send_response(
                            gatts_if,
                            p.conn_id,
                            p.trans_id,
                            esp_gatt_status_t_ESP_GATT_OK,
                            core::ptr::null_mut(),
                        );
                    }
                }
            } else if handle == BLE_DIGITAL_CHAR_HANDLE.load(AtomicOrdering::Relaxed) {
                BLE_WRITE_TRANS_ID.store(p.trans_id, AtomicOrdering::Relaxed);
                let att_opcode = if p.need_rsp {
                    gatt::ATT_OPCODE_WRITE_REQUEST
                } else {
                    0x52 // Write Command
                };
                push_stack_event(StackEvent::write_request(
                    p.conn_id as ConnHandle,
                    gatt::CHAR_DIGITAL_OUT,
                    att_opcode,
                    data,
                ));
            }
        }
        _ => {}
    }
}

// ───────────────────────────────────────────────────────────────
// Adapter
// ───────────────────────────────────────────────────────────────

pub struct BleAdapter {
    device_name: heapless::String<24>,
    /// Advertising parameters assembled by the timing call and consumed
    /// by `start_advertising`.
    #[cfg(target_os = "espidf")]
    adv_interval_min: u16,
    #[cfg(target_os = "espidf")]
    adv_interval_max: u16,
}

impl BleAdapter {
    pub fn new(device_name: heapless::String<24>) -> Self {
        Self {
            device_name,
            #[cfg(target_os = "espidf")]
            adv_interval_min: 0xA0,
            #[cfg(target_os = "espidf")]
            adv_interval_max: 0xA0,
        }
    }

    /// Bring up the controller and register the GATT application.
    /// The stack reports readiness asynchronously via [`StackEvent::Boot`].
    #[cfg(target_os = "espidf")]
    pub fn start(&mut self) -> Result<(), TransportError> {
        // SAFETY: one-shot controller bring-up from the main task.
        unsafe {
            esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT);

            let mut bt_cfg = esp_bt_controller_config_t::default();
            let ret = esp_bt_controller_init(&mut bt_cfg);
            if ret != ESP_OK {
                return Err(TransportError::Advertising(ret));
            }
            let ret = esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE);
            if ret != ESP_OK {
                return Err(TransportError::Advertising(ret));
            }
            let ret = esp_bluedroid_init();
            if ret != ESP_OK {
                return Err(TransportError::Advertising(ret));
            }
            let ret = esp_bluedroid_enable();
            if ret != ESP_OK {
                return Err(TransportError::Advertising(ret));
            }

            esp_ble_gap_register_callback(Some(ble_gap_event_handler));
            esp_ble_gatts_register_callback(Some(ble_gatts_event_handler));

            // The GAP API wants a NUL-terminated C string.
            let mut name = [0u8; 25];
            let n = self.device_name.len().min(name.len() - 1);
            name[..n].copy_from_slice(&self.device_name.as_bytes()[..n]);
            esp_ble_gap_set_device_name(name.as_ptr().cast());
            let ret = esp_ble_gatts_app_register(0);
            if ret != ESP_OK {
                return Err(TransportError::Advertising(ret));
            }
        }
        info!("ble(espidf): Bluedroid up, registering GATT table");
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn start(&mut self) -> Result<(), TransportError> {
        info!("ble(sim): stack started for '{}'", self.device_name);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn gatts_if() -> u8 {
        BLE_GATTS_IF.load(AtomicOrdering::Relaxed) as u8
    }

    /// Map a static table identifier to the stack-assigned handle.
    #[cfg(target_os = "espidf")]
    fn resolve_char(characteristic: CharHandle) -> u16 {
        match characteristic {
            gatt::CHAR_TEMPERATURE => BLE_TEMP_CHAR_HANDLE.load(AtomicOrdering::Relaxed) as u16,
            gatt::CHAR_DIGITAL_OUT => BLE_DIGITAL_CHAR_HANDLE.load(AtomicOrdering::Relaxed) as u16,
            other => other,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// TransportPort implementation — ESP-IDF
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl TransportPort for BleAdapter {
    fn create_advertising_set(&mut self) -> Result<AdvSetHandle, TransportError> {
        // Bluedroid keeps one implicit advertiser; the set handle is a
        // local identity so the dispatcher can treat it like any stack
        // object.
        Ok(0)
    }

    fn generate_advertising_data(&mut self, _set: AdvSetHandle) -> Result<(), TransportError> {
        let mut adv_data = esp_ble_adv_data_t {
            set_scan_rsp: false,
            include_name: true,
            include_txpower: false,
            min_interval: 0,
            max_interval: 0,
            appearance: 0,
            manufacturer_len: 0,
            p_manufacturer_data: core::ptr::null_mut(),
            service_data_len: 0,
            p_service_data: core::ptr::null_mut(),
            service_uuid_len: 0,
            p_service_uuid: core::ptr::null_mut(),
            // General discoverable, BR/EDR unsupported.
            flag: (ESP_BLE_ADV_FLAG_GEN_DISC | ESP_BLE_ADV_FLAG_BREDR_NOT_SPT) as u8,
        };
        // SAFETY: Bluedroid copies the struct before returning.
        let ret = unsafe { esp_ble_gap_config_adv_data(&mut adv_data) };
        if ret != ESP_OK {
            return Err(TransportError::Advertising(ret));
        }
        Ok(())
    }

    fn set_advertising_timing(
        &mut self,
        _set: AdvSetHandle,
        interval_min_ms: u32,
        interval_max_ms: u32,
        _duration_ms: u16,
        _max_events: u8,
    ) -> Result<(), TransportError> {
        // Stack units are 0.625 ms slots; duration/event caps of zero mean
        // indefinite advertising, which is Bluedroid's default behaviour.
        self.adv_interval_min = (interval_min_ms * 16 / 10) as u16;
        self.adv_interval_max = (interval_max_ms * 16 / 10) as u16;
        Ok(())
    }

    fn start_advertising(&mut self, _set: AdvSetHandle) -> Result<(), TransportError> {
        let mut params = esp_ble_adv_params_t {
            adv_int_min: self.adv_interval_min,
            adv_int_max: self.adv_interval_max,
            adv_type: esp_ble_adv_type_t_ADV_TYPE_IND,
            own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
            channel_map: esp_ble_adv_channel_t_ADV_CHNL_ALL,
            adv_filter_policy: esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
            // SAFETY: remaining fields are zeroed per Bluedroid convention.
            ..unsafe { core::mem::zeroed() }
        };
        // SAFETY: Bluedroid copies the struct before returning.
        let ret = unsafe { esp_ble_gap_start_advertising(&mut params) };
        if ret != ESP_OK {
            return Err(TransportError::Advertising(ret));
        }
        Ok(())
    }

    fn send_read_response(
        &mut self,
        connection: ConnHandle,
        characteristic: CharHandle,
        value: &[u8],
    ) -> Result<(), TransportError> {
        let mut rsp: esp_gatt_rsp_t = unsafe { core::mem::zeroed() };
        let take = value.len().min(ESP_GATT_MAX_ATTR_LEN as usize);
        rsp.attr_value.handle = Self::resolve_char(characteristic);
        rsp.attr_value.len = take as u16;
        rsp.attr_value.value[..take].copy_from_slice(&value[..take]);

        // SAFETY: responds to the transaction recorded by the read callback.
        let ret = unsafe {
            esp_ble_gatts_send_response(
                Self::gatts_if(),
                connection as u16,
                BLE_READ_TRANS_ID.load(AtomicOrdering::Relaxed),
                esp_gatt_status_t_ESP_GATT_OK,
                &mut rsp,
            )
        };
        if ret != ESP_OK {
            return Err(TransportError::ReadResponse(ret));
        }
        Ok(())
    }

    fn send_notification(
        &mut self,
        connection: ConnHandle,
        characteristic: CharHandle,
        value: &[u8],
    ) -> Result<(), TransportError> {
        // SAFETY: Bluedroid copies the value buffer before returning.
        let ret = unsafe {
            esp_ble_gatts_send_indicate(
                Self::gatts_if(),
                connection as u16,
                Self::resolve_char(characteristic),
                value.len() as u16,
                value.as_ptr() as *mut u8,
                false, // notification, no confirmation
            )
        };
        if ret != ESP_OK {
            return Err(TransportError::Notification(ret));
        }
        Ok(())
    }

    fn send_write_response(
        &mut self,
        connection: ConnHandle,
        _characteristic: CharHandle,
    ) -> Result<(), TransportError> {
        // SAFETY: responds to the transaction recorded by the write callback.
        let ret = unsafe {
            esp_ble_gatts_send_response(
                Self::gatts_if(),
                connection as u16,
                BLE_WRITE_TRANS_ID.load(AtomicOrdering::Relaxed),
                esp_gatt_status_t_ESP_GATT_OK,
                core::ptr::null_mut(),
            )
        };
        if ret != ESP_OK {
            return Err(TransportError::WriteResponse(ret));
        }
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// TransportPort implementation — host simulation
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl TransportPort for BleAdapter {
    fn create_advertising_set(&mut self) -> Result<AdvSetHandle, TransportError> {
        info!("ble(sim): advertising set created");
        Ok(0)
    }

    fn generate_advertising_data(&mut self, _set: AdvSetHandle) -> Result<(), TransportError> {
        info!("ble(sim): advertising data generated for '{}'", self.device_name);
        Ok(())
    }

    fn set_advertising_timing(
        &mut self,
        _set: AdvSetHandle,
        interval_min_ms: u32,
        interval_max_ms: u32,
        _duration_ms: u16,
        _max_events: u8,
    ) -> Result<(), TransportError> {
        info!(
            "ble(sim): advertising timing {}..{} ms",
            interval_min_ms, interval_max_ms
        );
        Ok(())
    }

    fn start_advertising(&mut self, _set: AdvSetHandle) -> Result<(), TransportError> {
        info!("ble(sim): advertising started");
        Ok(())
    }

    fn send_read_response(
        &mut self,
        _connection: ConnHandle,
        _characteristic: CharHandle,
        value: &[u8],
    ) -> Result<(), TransportError> {
        info!("ble(sim): read response {:02x?}", value);
        Ok(())
    }

    fn send_notification(
        &mut self,
        _connection: ConnHandle,
        _characteristic: CharHandle,
        value: &[u8],
    ) -> Result<(), TransportError> {
        info!("ble(sim): notification {:02x?}", value);
        Ok(())
    }

    fn send_write_response(
        &mut self,
        _connection: ConnHandle,
        _characteristic: CharHandle,
    ) -> Result<(), TransportError> {
        info!("ble(sim): write response sent");
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn make_adapter() -> BleAdapter {
        let mut name = heapless::String::<24>::new();
        name.push_str("thermonode-test").ok();
        BleAdapter::new(name)
    }

    #[test]
    fn sim_transport_accepts_full_boot_sequence() {
        let mut adapter = make_adapter();
        adapter.start().unwrap();
        let set = adapter.create_advertising_set().unwrap();
        adapter.generate_advertising_data(set).unwrap();
        adapter.set_advertising_timing(set, 100, 100, 0, 0).unwrap();
        adapter.start_advertising(set).unwrap();
    }

    #[test]
    fn sim_poll_has_no_events() {
        assert_eq!(poll_stack_event(), None);
    }
}
