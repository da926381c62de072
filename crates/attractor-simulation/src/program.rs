//! Shader compilation with diagnostics
//!
//! Compile and link problems are reported, never fatal: the pipeline handle
//! is returned either way together with a [`CompileReport`], and callers gate
//! dispatch/draw on [`CompileReport::linked`].

use std::fmt::Write as _;

/// Outcome of compiling one program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileReport {
    pub label: String,
    pub linked: bool,
    pub diagnostics: String,
}

impl CompileReport {
    fn log(&self) {
        log::info!("{} compile status: {}", self.label, self.linked);
        if self.diagnostics.is_empty() {
            return;
        }
        if self.linked {
            log::warn!("{} log:\n{}", self.label, self.diagnostics);
        } else {
            log::error!("{} log:\n{}", self.label, self.diagnostics);
        }
    }
}

/// A pipeline handle plus the report from building it
pub struct Compiled<P> {
    pub handle: P,
    pub report: CompileReport,
}

impl<P> Compiled<P> {
    pub fn is_linked(&self) -> bool {
        self.report.linked
    }
}

/// Compile `source` as WGSL and build a pipeline from it with `build`.
///
/// Validation errors from both the shader module and the pipeline are
/// captured in an error scope instead of reaching the device's uncaptured
/// error handler.
pub async fn compile_program<P>(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    build: impl FnOnce(&wgpu::ShaderModule) -> P,
) -> Compiled<P> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    let info = module.get_compilation_info().await;
    let handle = build(&module);
    let error = device.pop_error_scope().await;

    let mut diagnostics = String::new();
    let mut has_errors = false;
    for message in &info.messages {
        if matches!(message.message_type, wgpu::CompilationMessageType::Error) {
            has_errors = true;
        }
        match &message.location {
            Some(location) => {
                let _ = writeln!(
                    diagnostics,
                    "{:?} at {}:{}: {}",
                    message.message_type,
                    location.line_number,
                    location.line_position,
                    message.message
                );
            }
            None => {
                let _ = writeln!(diagnostics, "{:?}: {}", message.message_type, message.message);
            }
        }
    }
    if let Some(error) = &error {
        let _ = writeln!(diagnostics, "{error}");
    }

    let report = CompileReport {
        label: label.to_owned(),
        linked: error.is_none() && !has_errors,
        diagnostics: diagnostics.trim_end().to_owned(),
    };
    report.log();

    Compiled { handle, report }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_device::noop_device;

    fn compile_compute(device: &wgpu::Device, source: &str) -> Compiled<wgpu::ComputePipeline> {
        pollster::block_on(compile_program(device, "Test Kernel", source, |module| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("Test Pipeline"),
                layout: None,
                module,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                cache: None,
            })
        }))
    }

    #[test]
    fn broken_source_is_reported_not_fatal() {
        let (device, _queue) = noop_device(wgpu::Limits::default());
        let broken = "@compute @workgroup_size(1) fn main() { let x = ; }";
        let compiled = compile_compute(&device, broken);

        assert!(!compiled.is_linked());
        assert_eq!(compiled.report.label, "Test Kernel");
        assert!(!compiled.report.diagnostics.is_empty());
    }

    #[test]
    fn integration_kernel_links_cleanly() {
        let (device, _queue) = noop_device(wgpu::Limits::default());
        let compiled = compile_compute(&device, include_str!("shaders/integrate.wgsl"));

        assert!(compiled.is_linked(), "{}", compiled.report.diagnostics);
        assert!(compiled.report.diagnostics.is_empty());
    }
}
