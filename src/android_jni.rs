//! JNI bindings for the Android app.
//!
//! Each public function here corresponds to an `external fun` declaration
//! in RustBridge.kt. The function names follow JNI naming conventions:
//! Java_<package>_<class>_<method> with dots replaced by underscores.

use jni::objects::{JByteArray, JClass, JString};
use jni::sys::{jbyteArray, jstring};
use jni::JNIEnv;
use log::{error, info};

use crate::options::Options;

/// Initialize logging once per process. Only Android has a log sink.
#[cfg(target_os = "android")]
fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("FitCourseRust"),
    );
}

#[cfg(not(target_os = "android"))]
fn init_logging() {}

/// Returns the library version.
/// Maps to: RustBridge.version() -> String
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_fitcourse_app_RustBridge_version(
    env: JNIEnv,
    _class: JClass,
) -> jstring {
    match env.new_string(crate::VERSION) {
        Ok(s) => s.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Converts GPX bytes into FIT course bytes.
/// Maps to: RustBridge.gpxToFit(gpx: ByteArray, name: String, optionsJson: String?) -> ByteArray
///
/// A null or blank `optionsJson` uses the defaults. Failures throw a
/// `RuntimeException` and return null.
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_fitcourse_app_RustBridge_gpxToFit(
    mut env: JNIEnv,
    _class: JClass,
    gpx: JByteArray,
    name: JString,
    options_json: JString,
) -> jbyteArray {
    init_logging();

    match gpx_to_fit(&mut env, &gpx, &name, &options_json) {
        Ok(array) => array,
        Err(message) => {
            error!("gpxToFit failed: {message}");
            let _ = env.throw_new("java/lang/RuntimeException", message);
            std::ptr::null_mut()
        }
    }
}

fn gpx_to_fit(
    env: &mut JNIEnv,
    gpx: &JByteArray,
    name: &JString,
    options_json: &JString,
) -> Result<jbyteArray, String> {
    let data = env
        .convert_byte_array(gpx)
        .map_err(|e| format!("cannot read GPX bytes: {e}"))?;
    let name: String = env
        .get_string(name)
        .map_err(|e| format!("cannot read course name: {e}"))?
        .into();
    let options = if options_json.is_null() {
        Options::default()
    } else {
        let json: String = env
            .get_string(options_json)
            .map_err(|e| format!("cannot read options: {e}"))?
            .into();
        Options::from_json_str(&json).map_err(|e| e.to_string())?
    };

    info!("Converting {} bytes of GPX to course {:?}", data.len(), name);
    let fit = crate::convert(data.as_slice(), &name, &options).map_err(|e| e.to_string())?;

    let array = env
        .byte_array_from_slice(&fit)
        .map_err(|e| format!("cannot allocate result: {e}"))?;
    Ok(array.into_raw())
}
