//! Kernels run through the executor on the host and on a device

use approx::assert_relative_eq;
use std::sync::Arc;
use ufunc_core::prelude::*;
use ufunc_core::CompileCache;
use ufunc_kernels::*;

fn executor() -> Executor {
    Executor::sequential().with_cache(Arc::new(CompileCache::new()))
}

fn device() -> DeviceContext {
    DeviceContext::open(
        DeviceConfig::new()
            .with_memory_bytes(8 << 20)
            .with_threads_per_block(64)
            .with_units(2),
    )
    .unwrap()
}

fn uniform(n: usize, lo: f32, hi: f32) -> Vec<f32> {
    // deterministic low-discrepancy fill
    (0..n)
        .map(|i| lo + (hi - lo) * ((i as f32 * 0.618_034).fract()))
        .collect()
}

#[test]
fn test_gaussian_pdf_single_element() {
    let out = executor()
        .call(&GaussianPdf, &[0.0f32.into(), 0.0f32.into(), 1.0f32.into()])
        .unwrap();
    assert_eq!(out.shape(), &Shape::scalar());
    assert_relative_eq!(out.as_slice::<f32>().unwrap()[0], 0.398_942_3, epsilon = 1e-6);
}

#[test]
fn test_gaussian_variants_agree() {
    let exec = executor();
    let ctx = device();
    let x = NumericArray::from_vec(uniform(10_000, -3.0, 3.0));
    let operands = [Operand::from(&x), 0.0f32.into(), 1.0f32.into()];

    let gpu = exec.call_on(&ctx, &GaussianPdf, &operands).unwrap();
    let cpu = exec.call(&CpuGaussianPdf::<f32>::new(), &operands).unwrap();
    let reference = norm_pdf(&x, 0.0, 1.0).unwrap();

    let gpu = gpu.as_slice::<f32>().unwrap();
    let cpu = cpu.as_slice::<f32>().unwrap();
    let reference = reference.as_slice::<f64>().unwrap();
    for i in 0..gpu.len() {
        assert_relative_eq!(gpu[i], cpu[i], max_relative = 1e-5);
        assert_relative_eq!(f64::from(gpu[i]), reference[i], max_relative = 1e-5);
    }
}

#[test]
fn test_add_ufunc_row_column() {
    let a = NumericArray::from_vec(vec![10i64, 20, 30, 40]);
    let b = NumericArray::arange::<i64>(16).unwrap().reshape([4, 4]).unwrap();
    let out = executor()
        .call_on(&device(), &Add::<i64>::new(), &[(&a).into(), (&b).into()])
        .unwrap();

    assert_eq!(out.shape(), &Shape::new([4, 4]));
    assert_eq!(
        out.as_slice::<i64>().unwrap(),
        &[10, 21, 32, 43, 14, 25, 36, 47, 18, 29, 40, 51, 22, 33, 44, 55]
    );
}

#[test]
fn test_add_ten_on_range() {
    let nums = NumericArray::arange::<i64>(10).unwrap();
    let out = executor().call(&AddTen::<i64>::new(), &[(&nums).into()]).unwrap();
    assert_eq!(
        out.as_slice::<i64>().unwrap(),
        &[10, 11, 12, 13, 14, 15, 16, 17, 18, 19]
    );

    let floats = NumericArray::from_vec(vec![0.5f64]);
    assert!(matches!(
        executor().call(&AddTen::<i64>::new(), &[(&floats).into()]),
        Err(Error::TypeMismatch { .. })
    ));
}

#[test]
fn test_add_wraps_on_integer_overflow() {
    let a = NumericArray::from_vec(vec![i64::MAX, 1]);
    let add = Add::<i64>::new();
    let host = executor().call(&add, &[(&a).into(), 1i64.into()]).unwrap();
    assert_eq!(host.as_slice::<i64>().unwrap(), &[i64::MIN, 2]);

    let dev = executor().call_on(&device(), &add, &[(&a).into(), 1i64.into()]).unwrap();
    assert!(dev.bit_eq(&host));
}

#[test]
fn test_fractional_scalar_rejected_by_integer_kernel() {
    let a = NumericArray::from_vec(vec![10i64, 20]);
    let exec = executor();
    let add = Add::<i64>::new();

    assert!(matches!(
        exec.call(&add, &[(&a).into(), 2.9f64.into()]),
        Err(Error::TypeMismatch { .. })
    ));
    // whole-valued floats are still accepted
    let out = exec.call(&add, &[(&a).into(), 2.0f64.into()]).unwrap();
    assert_eq!(out.as_slice::<i64>().unwrap(), &[12, 22]);
}

#[test]
fn test_hypot_scalar_call() {
    let exec = executor();
    assert_eq!(exec.call_scalar(&Hypot, (3.0, 4.0)).unwrap(), 5.0);
    assert_eq!(hypot(3.0, 4.0), 3.0f64.hypot(4.0));
    assert_eq!(exec.cache().stats().misses, 1);
}

#[test]
fn test_polar_kernels_on_device() {
    let exec = executor();
    let ctx = device();
    let n = 5000;
    let rho1 = NumericArray::from_vec(uniform(n, 0.5, 1.5));
    let theta1 = NumericArray::from_vec(uniform(n, -3.14, 3.14));
    let rho2 = NumericArray::from_vec(uniform(n, 1.5, 0.5));
    let theta2 = NumericArray::from_vec(uniform(n, 3.14, -3.14));

    let dist = exec
        .call_on(
            &ctx,
            &PolarDistance,
            &[(&rho1).into(), (&theta1).into(), (&rho2).into(), (&theta2).into()],
        )
        .unwrap();

    // the same distance from the two-output kernel's columns
    let (x1, y1) = exec
        .call_on(&ctx, &PolarToCartesian, &[(&rho1).into(), (&theta1).into()])
        .unwrap();
    let (x2, y2) = exec
        .call(&PolarToCartesian, &[(&rho2).into(), (&theta2).into()])
        .unwrap();

    let dist = dist.as_slice::<f32>().unwrap();
    let (x1, y1) = (x1.as_slice::<f32>().unwrap(), y1.as_slice::<f32>().unwrap());
    let (x2, y2) = (x2.as_slice::<f32>().unwrap(), y2.as_slice::<f32>().unwrap());
    for i in 0..n {
        let expected = ((x1[i] - x2[i]).powi(2) + (y1[i] - y2[i]).powi(2)).sqrt();
        assert_relative_eq!(dist[i], expected, max_relative = 1e-5, epsilon = 1e-6);
        assert!(dist[i] <= 3.0 + 1e-5);
    }
}

#[test]
fn test_l2_norm_of_unit_vectors() {
    let exec = executor();
    let ctx = device();
    let angles = uniform(10, -3.14, 3.14);
    let coords: Vec<f32> = angles.iter().flat_map(|a| [a.cos(), a.sin()]).collect();
    let coords = NumericArray::from_shape_vec([10, 2], coords).unwrap();

    let host = exec.reduce_rows(&L2Norm, &coords).unwrap();
    let dev = exec.reduce_rows_on(&ctx, &L2Norm, &coords).unwrap();

    assert_eq!(host.shape(), &Shape::vector(10));
    assert!(host.bit_eq(&dev));
    for &norm in host.as_slice::<f32>().unwrap() {
        assert_relative_eq!(norm, 1.0, epsilon = 1e-6);
    }

    assert!(matches!(
        exec.reduce_rows(&L2Norm, &NumericArray::scalar(1.0f32)),
        Err(Error::ShapeMismatch { .. })
    ));
}

#[test]
fn test_pulse_train_pipeline_stays_on_device() {
    let exec = executor();
    let ctx = device();
    let n = 100_000;
    let period = n as f32 / 23.0;
    let t = NumericArray::arange::<f32>(n).unwrap();
    let noise = NumericArray::from_vec(uniform(n, -3.0, 3.0));

    let d_noise = ctx.to_device(&noise).unwrap();
    let d_t = ctx.to_device(&t).unwrap();
    let d_pulses = ctx.allocate(n, DType::F32).unwrap();
    ctx.reset_stats();

    exec.call_on_into(
        &ctx,
        &MakePulses,
        &[(&d_t).into(), period.into(), 100.0f32.into()],
        &d_pulses,
    )
    .unwrap();
    let d_waveform = exec
        .call_on_device(&ctx, &Add::<f32>::new(), &[(&d_pulses).into(), (&d_noise).into()])
        .unwrap();

    let stats = ctx.stats();
    assert_eq!(stats.host_to_device_copies, 0);
    assert_eq!(stats.device_to_host_copies, 0);
    assert_eq!(stats.launches, 2);

    let waveform = ctx.to_host(&d_waveform).unwrap();
    let w = waveform.as_slice::<f32>().unwrap();
    let nz = noise.as_slice::<f32>().unwrap();
    let tv = t.as_slice::<f32>().unwrap();
    for i in (0..n).step_by(997) {
        let expected = MakePulses.call((tv[i], period, 100.0)) + nz[i];
        assert_eq!(w[i], expected);
    }
}

#[test]
fn test_host_only_kernel_fails_to_compile_for_device() {
    let exec = executor();
    let ctx = device();
    let x = NumericArray::from_vec(vec![0.0f64, 1.0]);
    let operands = [Operand::from(&x), 0.0f64.into(), 1.0f64.into()];

    assert!(exec.call(&NormPdf, &operands).is_ok());
    assert!(matches!(
        exec.call_on(&ctx, &NormPdf, &operands),
        Err(Error::CompileFailure { .. })
    ));
    assert_eq!(ctx.stats().host_to_device_copies, 0);
}

#[test]
fn test_float64_needs_device_support() {
    let exec = executor();
    let ctx = DeviceContext::open(DeviceConfig::new().with_units(1).with_f64(false)).unwrap();
    let x = NumericArray::from_vec(vec![3.0f64]);

    assert!(matches!(
        exec.call_on(&ctx, &Hypot, &[(&x).into(), 4.0f64.into()]),
        Err(Error::UnsupportedTarget(_))
    ));
}

#[test]
fn test_registry_inspection_after_calls() {
    let exec = executor();
    let registry = builtin_registry().unwrap();
    exec.call_scalar(&Hypot, (3.0, 4.0)).unwrap();

    let infos = registry.infos(exec.cache());
    assert_eq!(infos.len(), registry.len());
    let compiled: Vec<&str> = infos
        .iter()
        .filter(|info| !info.compiled.is_empty())
        .map(|info| info.name)
        .collect();
    assert_eq!(compiled, vec!["hypot"]);
    assert!(infos.iter().all(|info| info.outputs() >= 1));

    let info = registry.info("hypot", exec.cache()).unwrap();
    assert_eq!(
        info.to_string(),
        "hypot\n    signature: float64(float64, float64)\n    device: yes\n    compiled: host"
    );
}
