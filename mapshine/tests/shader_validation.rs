//! Every pass shader must parse and validate, and the WGSL uniform structs
//! must have exactly the size of their Rust mirrors.

use mapshine::shaders::ShaderKind;
use mapshine_common::uniforms::{
    CloudShadowMaterial, EnvironmentBlock, FogMaterial, LightBlock, SpecularBlock,
    SpecularMaterial, ViewBlock, WindowLightBlock, WindowLightMaterial,
};

fn parse_and_validate(kind: ShaderKind) -> Result<naga::Module, String> {
    let source = kind.source();
    let module = naga::front::wgsl::parse_str(&source)
        .map_err(|e| format!("WGSL parse error for {:?}: {}", kind, e.emit_to_string(&source)))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map_err(|e| format!("Validation error for {:?}: {:?}", kind, e))?;
    Ok(module)
}

fn struct_size(module: &naga::Module, name: &str) -> u32 {
    let mut layouter = naga::proc::Layouter::default();
    layouter
        .update(module.to_ctx())
        .expect("layout computation failed");
    let (handle, _) = module
        .types
        .iter()
        .find(|(_, ty)| ty.name.as_deref() == Some(name))
        .unwrap_or_else(|| panic!("struct {name} not declared"));
    layouter[handle].size
}

#[test]
fn test_all_shaders_validate() {
    let mut failures = Vec::new();
    for kind in ShaderKind::ALL {
        if let Err(e) = parse_and_validate(kind) {
            failures.push(e);
        }
    }
    assert!(
        failures.is_empty(),
        "{} shader(s) failed:\n{}",
        failures.len(),
        failures.join("\n\n")
    );
}

#[test]
fn test_uniform_layouts_match_rust() {
    let module = parse_and_validate(ShaderKind::Specular).expect("specular shader");
    let expected = [
        ("ViewBlock", size_of::<ViewBlock>()),
        ("EnvironmentBlock", size_of::<EnvironmentBlock>()),
        ("LightBlock", size_of::<LightBlock>()),
        ("SpecularBlock", size_of::<SpecularBlock>()),
        ("SpecularMaterial", size_of::<SpecularMaterial>()),
        ("WindowLightBlock", size_of::<WindowLightBlock>()),
        ("WindowLightMaterial", size_of::<WindowLightMaterial>()),
        ("FogMaterial", size_of::<FogMaterial>()),
        ("CloudShadowMaterial", size_of::<CloudShadowMaterial>()),
    ];
    for (name, rust_size) in expected {
        assert_eq!(
            struct_size(&module, name) as usize,
            rust_size,
            "{name} differs between WGSL and Rust"
        );
    }
}

#[test]
fn test_entry_points_present() {
    for kind in ShaderKind::ALL {
        let module = parse_and_validate(kind).expect("shader validates");
        let names: Vec<&str> = module.entry_points.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"vs"), "{kind:?} missing vs");
        assert!(names.contains(&"fs"), "{kind:?} missing fs");
    }
}

#[test]
fn test_wet_darkening_independent_of_rain_intensity() {
    // Darkening follows the river mask alone; only the glint scales with rain.
    let source = ShaderKind::WindowLight.source();
    let darkening: Vec<&str> = source.lines().filter(|l| l.contains("1.0 - wet")).collect();
    assert_eq!(darkening.len(), 1, "{darkening:?}");
    assert!(!darkening[0].contains("rain_k"), "{}", darkening[0]);
    assert!(source.lines().any(|l| l.contains("let glint") && l.contains("rain_k")));
}
