//! `ForeignRuntime` over a raw JNI function table.
//!
//! Every entry point maps one-to-one onto a JNI function. Failures are
//! reported the JNI way (null plus a pending exception) and left for the
//! exception translator.
//!
//! Strings cross as NUL-terminated UTF-8. Supplementary characters are
//! read lossily from the runtime's modified UTF-8.

use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::ptr;

use ::jni::sys;
use ::jni::JNIEnv;

use crate::runtime::{Arg, ForeignRuntime, ReturnKind, Value};

/// Call a JNI function through the environment's function table.
///
/// Evaluates to `None` if the table has no entry for the function.
macro_rules! jni_call {
    ($env:expr, $func:ident $(, $arg:expr)* $(,)?) => {{
        let env: *mut sys::JNIEnv = $env;
        match (**env).$func {
            Some(func) => Some(func(env $(, $arg)*)),
            None => None,
        }
    }};
}

/// Global reference to a `java.lang.Class`.
#[derive(Debug)]
pub struct JniType(sys::jclass);

#[derive(Debug, Clone, Copy)]
pub struct JniMethod(sys::jmethodID);

#[derive(Debug, Clone, Copy)]
pub struct JniField(sys::jfieldID);

/// A local or global object reference.
#[derive(Debug)]
pub struct JniRef(sys::jobject);

/// The execution context of one attached thread.
///
/// Borrowing the `JNIEnv` ties every handle built on this runtime to the
/// attachment that produced it. The raw pointer keeps the type `!Send`.
#[derive(Debug, Clone, Copy)]
pub struct JniRuntime<'env> {
    env: *mut sys::JNIEnv,
    _attached: PhantomData<&'env ()>,
}

impl<'env> JniRuntime<'env> {
    pub fn new(env: &'env JNIEnv<'_>) -> Self {
        Self {
            env: env.get_raw(),
            _attached: PhantomData,
        }
    }

    /// # Safety
    ///
    /// `env` must be a valid `JNIEnv` pointer for the current thread and
    /// must stay valid for `'env`.
    pub unsafe fn from_raw(env: *mut sys::JNIEnv) -> Self {
        Self {
            env,
            _attached: PhantomData,
        }
    }

    fn non_null(object: sys::jobject) -> Option<JniRef> {
        (!object.is_null()).then_some(JniRef(object))
    }
}

fn jvalues(args: &[Arg<'_, JniRef>]) -> Vec<sys::jvalue> {
    args.iter()
        .map(|arg| match arg {
            Arg::Int(v) => sys::jvalue { i: *v },
            Arg::Long(v) => sys::jvalue { j: *v },
            Arg::Object(reference) => sys::jvalue { l: reference.0 },
            Arg::Null => sys::jvalue { l: ptr::null_mut() },
        })
        .collect()
}

/// Releases a critical pin even if the copy panics.
struct CriticalPin {
    env: *mut sys::JNIEnv,
    array: sys::jarray,
    elements: *mut std::ffi::c_void,
}

impl Drop for CriticalPin {
    fn drop(&mut self) {
        // Mode 0: copy back (if the runtime handed out a copy) and unpin.
        unsafe {
            jni_call!(self.env, ReleasePrimitiveArrayCritical, self.array, self.elements, 0);
        }
    }
}

impl<'env> ForeignRuntime for JniRuntime<'env> {
    type Type = JniType;
    type Method = JniMethod;
    type Field = JniField;
    type Ref = JniRef;

    fn find_type(&self, name: &str) -> Option<JniType> {
        let name = CString::new(name).ok()?;
        unsafe {
            let local = jni_call!(self.env, FindClass, name.as_ptr())?;
            if local.is_null() {
                return None;
            }
            let global = jni_call!(self.env, NewGlobalRef, local);
            jni_call!(self.env, DeleteLocalRef, local);
            global.filter(|g| !g.is_null()).map(JniType)
        }
    }

    fn find_method(&self, ty: &JniType, name: &str, signature: &str) -> Option<JniMethod> {
        let name = CString::new(name).ok()?;
        let signature = CString::new(signature).ok()?;
        let method =
            unsafe { jni_call!(self.env, GetMethodID, ty.0, name.as_ptr(), signature.as_ptr())? };
        (!method.is_null()).then_some(JniMethod(method))
    }

    fn find_static_field(&self, ty: &JniType, name: &str, signature: &str) -> Option<JniField> {
        let name = CString::new(name).ok()?;
        let signature = CString::new(signature).ok()?;
        let field = unsafe {
            jni_call!(self.env, GetStaticFieldID, ty.0, name.as_ptr(), signature.as_ptr())?
        };
        (!field.is_null()).then_some(JniField(field))
    }

    fn release_type(&self, ty: JniType) {
        unsafe {
            jni_call!(self.env, DeleteGlobalRef, ty.0);
        }
    }

    fn construct(&self, ty: &JniType, ctor: JniMethod, args: &[Arg<'_, JniRef>]) -> Option<JniRef> {
        let args = jvalues(args);
        let object = unsafe { jni_call!(self.env, NewObjectA, ty.0, ctor.0, args.as_ptr())? };
        Self::non_null(object)
    }

    fn invoke(
        &self,
        target: &JniRef,
        method: JniMethod,
        ret: ReturnKind,
        args: &[Arg<'_, JniRef>],
    ) -> Value<JniRef> {
        let args = jvalues(args);
        let (obj, id, argv) = (target.0, method.0, args.as_ptr());
        unsafe {
            match ret {
                ReturnKind::Void => {
                    jni_call!(self.env, CallVoidMethodA, obj, id, argv);
                    Value::Void
                }
                ReturnKind::Int => jni_call!(self.env, CallIntMethodA, obj, id, argv)
                    .map_or(Value::Void, Value::Int),
                ReturnKind::Long => jni_call!(self.env, CallLongMethodA, obj, id, argv)
                    .map_or(Value::Void, Value::Long),
                ReturnKind::Object => Value::Object(
                    jni_call!(self.env, CallObjectMethodA, obj, id, argv)
                        .and_then(Self::non_null),
                ),
            }
        }
    }

    fn read_static(&self, ty: &JniType, field: JniField) -> Option<JniRef> {
        let object = unsafe { jni_call!(self.env, GetStaticObjectField, ty.0, field.0)? };
        Self::non_null(object)
    }

    fn exception_pending(&self) -> bool {
        unsafe { jni_call!(self.env, ExceptionCheck) == Some(sys::JNI_TRUE) }
    }

    fn exception_occurred(&self) -> Option<JniRef> {
        let throwable = unsafe { jni_call!(self.env, ExceptionOccurred)? };
        Self::non_null(throwable)
    }

    fn exception_clear(&self) {
        unsafe {
            jni_call!(self.env, ExceptionClear);
        }
    }

    fn promote(&self, local: &JniRef) -> Option<JniRef> {
        let global = unsafe { jni_call!(self.env, NewGlobalRef, local.0)? };
        Self::non_null(global)
    }

    fn delete_local(&self, local: JniRef) {
        unsafe {
            jni_call!(self.env, DeleteLocalRef, local.0);
        }
    }

    fn delete_durable(&self, durable: JniRef) {
        unsafe {
            jni_call!(self.env, DeleteGlobalRef, durable.0);
        }
    }

    fn new_byte_array(&self, len: usize) -> Option<JniRef> {
        let len = sys::jsize::try_from(len).ok()?;
        let array = unsafe { jni_call!(self.env, NewByteArray, len)? };
        Self::non_null(array)
    }

    fn byte_array_len(&self, array: &JniRef) -> Option<usize> {
        let len = unsafe { jni_call!(self.env, GetArrayLength, array.0)? };
        usize::try_from(len).ok()
    }

    fn with_pinned_bytes<T>(&self, array: &JniRef, f: impl FnOnce(&mut [u8]) -> T) -> Option<T> {
        let len = self.byte_array_len(array)?;
        let elements = unsafe {
            jni_call!(self.env, GetPrimitiveArrayCritical, array.0, ptr::null_mut())?
        };
        if elements.is_null() {
            return None;
        }
        let pin = CriticalPin {
            env: self.env,
            array: array.0,
            elements,
        };
        let bytes = unsafe { std::slice::from_raw_parts_mut(pin.elements.cast::<u8>(), len) };
        Some(f(bytes))
    }

    fn new_string(&self, value: &str) -> Option<JniRef> {
        let value = CString::new(value).ok()?;
        let string = unsafe { jni_call!(self.env, NewStringUTF, value.as_ptr())? };
        Self::non_null(string)
    }

    fn read_string(&self, string: &JniRef) -> Option<String> {
        unsafe {
            let chars = jni_call!(self.env, GetStringUTFChars, string.0, ptr::null_mut())?;
            if chars.is_null() {
                return None;
            }
            let text = CStr::from_ptr(chars).to_string_lossy().into_owned();
            jni_call!(self.env, ReleaseStringUTFChars, string.0, chars);
            Some(text)
        }
    }
}
