use std::ffi::{CStr, CString};
use std::fmt::{Display, Formatter};
use std::os::raw::c_char;
use std::time::Duration;

use dlopen::wrapper::{Container, WrapperApi};
use thiserror::Error;

#[derive(Error, Clone, Debug)]
pub struct VisaError {
    desc: String,
    code: i32,
}

pub type VisaResult<T> = std::result::Result<T, VisaError>;

impl Display for VisaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("VisaError({}): `{}`", self.code, self.desc))
    }
}

impl VisaError {
    fn new(code: i32) -> Self {
        let desc = match VISA.as_ref() {
            Ok(visa) => visa.describe_status(code),
            Err(_) => String::new(),
        };
        Self { desc, code }
    }

    fn library(desc: String) -> Self {
        Self { desc, code: 0 }
    }
}

impl From<VisaError> for crate::Error {
    fn from(err: VisaError) -> Self {
        if err.code == VI_ERROR_TMO {
            return crate::Error::protocol_timeout();
        }
        crate::Error::transport(anyhow::Error::new(err))
    }
}

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        const VISA_LIBS: &[&str] = &["visa64.dll", "visa32.dll"];
    } else if #[cfg(target_os = "macos")] {
        const VISA_LIBS: &[&str] = &["/Library/Frameworks/VISA.framework/VISA"];
    } else {
        const VISA_LIBS: &[&str] = &["libvisa.so", "libvisa.so.0", "libiovisa.so"];
    }
}

type ViStatus = i32;
type ViAccessMode = u32;
type ViSession = u32;
type ViObject = u32;
type ViAttr = u32;
type ViAttrState = u64;

const VI_ERROR_TMO: ViStatus = 0xBFFF0015_u32 as i32;
const VI_SUCCESS_MAX_CNT: ViStatus = 0x3FFF0006;
const VI_ATTR_TMO_VALUE: ViAttr = 0x3FFF001A;
const VI_ATTR_TERMCHAR: ViAttr = 0x3FFF0018;
const VI_ATTR_TERMCHAR_EN: ViAttr = 0x3FFF0038;
const VI_TMO_INFINITE: u64 = 0xFFFFFFFF;

#[allow(non_snake_case)]
#[derive(WrapperApi)]
struct Api {
    viOpen: unsafe extern "C" fn(
        session: ViSession,
        rsrc: *const c_char,
        access_mode: ViAccessMode,
        timeout: u32,
        vi: *mut ViObject,
    ) -> ViStatus,
    viOpenDefaultRM: unsafe extern "C" fn(vi: *mut ViSession) -> ViStatus,
    viClose: unsafe extern "C" fn(vi: ViObject) -> ViStatus,
    viSetAttribute: unsafe extern "C" fn(vi: ViObject, attr: ViAttr, value: ViAttrState) -> ViStatus,
    viStatusDesc: unsafe extern "C" fn(vi: ViObject, status: ViStatus, value: *mut c_char) -> ViStatus,
    viRead: unsafe extern "C" fn(vi: ViSession, buf: *mut u8, cnt: u32, cnt_ret: *mut u32) -> ViStatus,
    viWrite: unsafe extern "C" fn(vi: ViSession, buf: *const u8, cnt: u32, cnt_ret: *mut u32) -> ViStatus,
}

struct Visa {
    api: Container<Api>,
    rm: ViSession,
}

lazy_static! {
    static ref VISA: Result<Visa, VisaError> = Visa::load();
}

impl Visa {
    fn load() -> Result<Self, VisaError> {
        let mut errors = Vec::new();
        for name in VISA_LIBS {
            let api: Container<Api> = match unsafe { Container::load(*name) } {
                Ok(api) => api,
                Err(err) => {
                    errors.push(format!("{}: {}", name, err));
                    continue;
                }
            };
            let mut rm: ViSession = 0;
            let ret = unsafe { api.viOpenDefaultRM(&mut rm as *mut ViSession) };
            if ret < 0 {
                return Err(VisaError::library(format!(
                    "Could not open resource manager: Error Code {}",
                    ret
                )));
            }
            log::debug!("Loaded VISA library {}", name);
            return Ok(Visa { api, rm });
        }
        Err(VisaError::library(format!(
            "No VISA library found ({})",
            errors.join("; ")
        )))
    }

    fn describe_status(&self, status: ViStatus) -> String {
        let mut data = [0 as c_char; 512];
        unsafe {
            self.api.viStatusDesc(self.rm, status, data.as_mut_ptr());
            CStr::from_ptr(data.as_ptr()).to_string_lossy().into_owned()
        }
    }
}

fn visa() -> VisaResult<&'static Visa> {
    VISA.as_ref().map_err(|x| x.clone())
}

fn check(status: ViStatus) -> VisaResult<ViStatus> {
    if status < 0 {
        Err(VisaError::new(status))
    } else {
        Ok(status)
    }
}

pub struct Instrument {
    instr: ViObject,
    addr: String,
}

impl Instrument {
    pub fn open(addr: &str, timeout: Duration) -> VisaResult<Instrument> {
        let visa = visa()?;
        let cstr = CString::new(addr).map_err(|_| VisaError::library(format!("Invalid resource `{}`", addr)))?;
        let mut handle: ViObject = 0;
        let tmo = timeout.as_millis().min(u32::MAX as u128) as u32;
        check(unsafe { visa.api.viOpen(visa.rm, cstr.as_ptr(), 0, tmo, &mut handle as *mut ViObject) })?;
        let ret = Instrument {
            instr: handle,
            addr: addr.to_string(),
        };
        ret.set_timeout(timeout)?;
        Ok(ret)
    }

    /// Reads at most `size` bytes. The flag is set if the driver stopped
    /// because the buffer was full and more data is pending.
    pub fn read(&self, size: usize) -> VisaResult<(Vec<u8>, bool)> {
        let visa = visa()?;
        let mut data = vec![0_u8; size];
        let mut actually_read = 0_u32;
        let status = check(unsafe {
            visa.api
                .viRead(self.instr, data.as_mut_ptr(), size as u32, &mut actually_read as *mut u32)
        })?;
        data.truncate(actually_read as usize);
        Ok((data, status == VI_SUCCESS_MAX_CNT))
    }

    pub fn write(&self, data: &[u8]) -> VisaResult<()> {
        let visa = visa()?;
        let mut actually_written = 0_u32;
        check(unsafe {
            visa.api
                .viWrite(self.instr, data.as_ptr(), data.len() as u32, &mut actually_written as *mut u32)
        })?;
        Ok(())
    }

    fn set_attribute(&self, attr: ViAttr, value: ViAttrState) -> VisaResult<()> {
        let visa = visa()?;
        check(unsafe { visa.api.viSetAttribute(self.instr, attr, value) })?;
        Ok(())
    }

    pub fn set_timeout(&self, timeout: Duration) -> VisaResult<()> {
        let ms = timeout.as_millis();
        let value = if ms >= VI_TMO_INFINITE as u128 {
            VI_TMO_INFINITE
        } else {
            ms as u64
        };
        self.set_attribute(VI_ATTR_TMO_VALUE, value)
    }

    /// Terminate reads on `termchar`. Needed for serial resources, which have
    /// no END signal.
    pub fn set_termchar(&self, termchar: u8) -> VisaResult<()> {
        self.set_attribute(VI_ATTR_TERMCHAR, termchar as u64)?;
        self.set_attribute(VI_ATTR_TERMCHAR_EN, 1)
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl Drop for Instrument {
    fn drop(&mut self) {
        if let Ok(visa) = visa() {
            let status = unsafe { visa.api.viClose(self.instr) };
            if status < 0 {
                log::warn!("Error closing {}: {}", self.addr, visa.describe_status(status));
            }
        }
    }
}
