use log::LevelFilter;
use std::time::Duration;

use vela::api::null::VelaApiDefNull;
use vela::api::*;
use vela::framework::{
    FrameTimer, PassRenderContext, PipelineCache, RenderGraphBufferDesc, RenderGraphError,
    RenderGraphTextureDesc, RenderPass, Renderer, RendererConfig, ResourcePlanner,
};

const SURFACE_WIDTH: u32 = 900;
const SURFACE_HEIGHT: u32 = 600;
const FRAME_COUNT: u64 = 60;

fn main() {
    env_logger::Builder::from_default_env()
        .format_timestamp_nanos()
        .filter_level(LevelFilter::Info)
        .init();

    run().unwrap();
}

// Per-frame data handed to every pass
struct SceneData {
    particle_count: u32,
    draw_particles: bool,
}

fn run() -> VelaResult<()> {
    //
    // Create the api. The latency makes the null device complete work asynchronously, the same
    // way a real GPU would.
    //
    let mut api = VelaApi::new_null(&VelaApiDefNull {
        execution_latency: Duration::from_millis(2),
    })?;

    // Wrap all of this so that it gets dropped before we drop the API object
    {
        let device_context = api.device_context();

        //
        // Stand-in for a swapchain image
        //
        let mut surface_extents = VelaExtents2D {
            width: SURFACE_WIDTH,
            height: SURFACE_HEIGHT,
        };
        let mut present_target = create_present_target(&device_context, surface_extents)?;

        let mut renderer = Renderer::new(&device_context, RendererConfig::default())?;
        renderer.set_surface_extents(surface_extents);
        renderer.register_pass(Box::new(SimulateParticlesPass));
        renderer.register_pass(Box::new(DepthPrepass));
        renderer.register_pass(Box::new(OpaquePass));
        renderer.register_pass(Box::new(PresentPass));
        renderer.import_texture("PresentTarget", &present_target, VelaResourceState::COMMON);

        let mut scene_data = SceneData {
            particle_count: 1024,
            draw_particles: true,
        };

        for frame in 1..=FRAME_COUNT {
            // Simulate a window resize halfway through
            if frame == FRAME_COUNT / 2 {
                surface_extents = VelaExtents2D {
                    width: SURFACE_WIDTH / 2,
                    height: SURFACE_HEIGHT / 2,
                };
                renderer.resize(surface_extents)?;
                present_target = create_present_target(&device_context, surface_extents)?;
                renderer.import_texture(
                    "PresentTarget",
                    &present_target,
                    VelaResourceState::COMMON,
                );
            }

            scene_data.draw_particles = frame % 10 != 0;
            let report = renderer.render_frame(&scene_data)?;
            log::info!(
                "Frame {}: {:?}, {} cross-queue waits, {} barrier-only submissions",
                report.frame_number,
                report.execution_order,
                report.cross_queue_wait_count,
                report.barrier_only_submission_count
            );
        }

        renderer.wait_for_idle()?;

        let validation_errors = device_context
            .null_device_context()
            .map(|x| x.validation_errors())
            .unwrap_or_default();
        for error in &validation_errors {
            log::warn!("{}", error);
        }

        log::info!(
            "Rendered {} frames, {} physical resources alive, {} pipelines, {} validation errors",
            renderer.frame_number(),
            renderer.frame_resources().resource_count(),
            renderer.pipeline_cache().pipeline_count(),
            validation_errors.len()
        );
    }

    // Optional, but calling this verifies that all rendering resources have been dropped.
    api.destroy()?;
    Ok(())
}

fn create_present_target(
    device_context: &VelaDeviceContext,
    extents: VelaExtents2D,
) -> VelaResult<VelaTexture> {
    device_context.create_texture(&VelaTextureDef {
        extents: extents.to_3d(),
        format: VelaFormat::B8G8R8A8_UNORM,
        usage: VelaResourceUsage::RENDER_TARGET,
        ..Default::default()
    })
}

//
// Passes
//
struct SimulateParticlesPass;

impl RenderPass<SceneData> for SimulateParticlesPass {
    fn name(&self) -> &str {
        "SimulateParticles"
    }

    fn queue_type(&self) -> VelaQueueType {
        VelaQueueType::Compute
    }

    fn is_active(
        &self,
        scene_data: &SceneData,
    ) -> bool {
        scene_data.draw_particles
    }

    fn prepare_resources(
        &mut self,
        planner: &mut ResourcePlanner,
        scene_data: &SceneData,
    ) -> Result<(), RenderGraphError> {
        planner.new_buffer(
            "Particles",
            RenderGraphBufferDesc {
                size: scene_data.particle_count as u64 * 32,
            },
        )?;
        Ok(())
    }

    fn render(
        &mut self,
        scene_data: &SceneData,
        context: &mut PassRenderContext,
        timer: &FrameTimer,
    ) -> VelaResult<()> {
        let constants = timer.delta_time().to_le_bytes();
        context.upload(&constants, 16)?;
        context
            .command_list()
            .dispatch((scene_data.particle_count + 63) / 64, 1, 1)
    }
}

struct DepthPrepass;

impl RenderPass<SceneData> for DepthPrepass {
    fn name(&self) -> &str {
        "DepthPrepass"
    }

    fn prepare_resources(
        &mut self,
        planner: &mut ResourcePlanner,
        _scene_data: &SceneData,
    ) -> Result<(), RenderGraphError> {
        planner.new_depth_stencil(
            "Depth",
            RenderGraphTextureDesc::new(VelaFormat::D32_SFLOAT),
        )?;
        Ok(())
    }

    fn render(
        &mut self,
        _scene_data: &SceneData,
        context: &mut PassRenderContext,
        _timer: &FrameTimer,
    ) -> VelaResult<()> {
        let depth = context.texture("Depth")?;
        context
            .command_list()
            .clear_depth_stencil(depth, Default::default())?;
        context.command_list().draw(3 * 128, 1)
    }
}

struct OpaquePass;

impl OpaquePass {
    fn root_signature_def() -> VelaRootSignatureDef {
        VelaRootSignatureDef {
            name: "Opaque".to_string(),
            parameter_count: 3,
            static_sampler_count: 1,
        }
    }
}

impl RenderPass<SceneData> for OpaquePass {
    fn name(&self) -> &str {
        "Opaque"
    }

    fn prepare_resources(
        &mut self,
        planner: &mut ResourcePlanner,
        scene_data: &SceneData,
    ) -> Result<(), RenderGraphError> {
        planner.read_depth_stencil("Depth")?;
        if scene_data.draw_particles {
            planner.read_buffer("Particles")?;
        }
        planner.new_render_target(
            "SceneColor",
            RenderGraphTextureDesc::new(VelaFormat::R16G16B16A16_SFLOAT),
        )?;
        Ok(())
    }

    fn create_pipeline_states(
        &mut self,
        pipeline_cache: &mut PipelineCache,
    ) -> VelaResult<()> {
        pipeline_cache.get_or_create_pipeline(
            &Self::root_signature_def(),
            &VelaPipelineDef {
                name: "Opaque".to_string(),
                pipeline_type: VelaPipelineType::Graphics,
                render_target_formats: vec![VelaFormat::R16G16B16A16_SFLOAT],
                depth_stencil_format: Some(VelaFormat::D32_SFLOAT),
            },
        )?;
        Ok(())
    }

    fn render(
        &mut self,
        scene_data: &SceneData,
        context: &mut PassRenderContext,
        _timer: &FrameTimer,
    ) -> VelaResult<()> {
        context.pipeline("Opaque")?;
        let scene_color = context.texture("SceneColor")?;
        context
            .command_list()
            .clear_render_target(scene_color, VelaColorClearValue([0.1, 0.1, 0.2, 1.0]))?;
        context.command_list().draw(3 * 128, 1)?;

        if scene_data.draw_particles {
            context
                .command_list()
                .draw(6, scene_data.particle_count)?;
        }

        Ok(())
    }
}

struct PresentPass;

impl RenderPass<SceneData> for PresentPass {
    fn name(&self) -> &str {
        "Present"
    }

    fn prepare_resources(
        &mut self,
        planner: &mut ResourcePlanner,
        _scene_data: &SceneData,
    ) -> Result<(), RenderGraphError> {
        planner.read_texture("SceneColor")?;
        planner.write_render_target("PresentTarget", None)?;
        Ok(())
    }

    fn render(
        &mut self,
        _scene_data: &SceneData,
        context: &mut PassRenderContext,
        _timer: &FrameTimer,
    ) -> VelaResult<()> {
        let present_target = context.texture("PresentTarget")?;
        context
            .command_list()
            .clear_render_target(present_target, Default::default())?;
        context.command_list().draw(3, 1)
    }
}
