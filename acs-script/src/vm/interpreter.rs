use crate::config::InterpreterConfig;
use crate::format::{BytecodeImage, DEFERRED_ARGS, MAX_MAP_VARS, MAX_WORLD_VARS};
use crate::host::{ActorRef, GameType, LineRef, ScriptRequest, ScriptRequests, WorldHost};
use crate::trace;

use super::print::PrintBuffer;
use super::state::{DeferredTask, InstanceId, ScriptInfo, ScriptSlot, ScriptState, StartOutcome};
use super::thread::{ExecEnv, ExecOutcome, ScriptInstance};

/// Script data that lives as long as the current level.
#[derive(Debug, Default)]
pub(crate) struct MapScripts {
    pub map: u32,
    pub image: BytecodeImage,
    pub slots: Vec<ScriptSlot>,
    pub map_vars: [i32; MAX_MAP_VARS],
}

/// Script data that survives level changes within one game.
#[derive(Debug)]
pub(crate) struct WorldScripts {
    pub world_vars: [i32; MAX_WORLD_VARS],
    pub deferred: Vec<DeferredTask>,
}

impl Default for WorldScripts {
    fn default() -> Self {
        Self { world_vars: [0; MAX_WORLD_VARS], deferred: Vec::new() }
    }
}

/// The script registry and scheduler.
///
/// Owns the per-entrypoint state table, every live [`ScriptInstance`] (in
/// the order they were started), map and world variables and the deferred
/// start queue. The game calls [`Interpreter::tick`] once per tic.
#[derive(Debug, Default)]
pub struct Interpreter {
    pub(crate) config: InterpreterConfig,
    pub(crate) level: MapScripts,
    pub(crate) world: WorldScripts,
    pub(crate) instances: Vec<ScriptInstance>,
    next_id: u64,
    print: PrintBuffer,
    requests: ScriptRequests,
}

impl Interpreter {
    pub fn new(config: InterpreterConfig) -> Self {
        Self { config, ..Default::default() }
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// Install a level's scripts. Instances of the previous level are dropped,
    /// map variables are zeroed and every entrypoint starts out inactive.
    pub fn load_map(&mut self, map: u32, image: BytecodeImage) {
        let slots = image.entrypoints().iter().map(ScriptSlot::new).collect();
        if !self.instances.is_empty() {
            log::debug!("dropping {} script instance(s) of map {}", self.instances.len(), self.level.map);
        }
        self.instances.clear();
        self.level = MapScripts { map, image, slots, map_vars: [0; MAX_MAP_VARS] };
        log::debug!("map {}: {} script(s) loaded", map, self.level.slots.len());
    }

    /// Forget world variables and deferred starts.
    pub fn new_game(&mut self) {
        self.world = WorldScripts::default();
    }

    pub fn current_map(&self) -> u32 {
        self.level.map
    }

    pub fn image(&self) -> &BytecodeImage {
        &self.level.image
    }

    pub(crate) fn alloc_id(&mut self) -> InstanceId {
        self.next_id += 1;
        InstanceId(self.next_id)
    }

    /// Start every open script after the grace delay. Scripts that already
    /// have an instance are left alone.
    pub fn start_open_scripts(&mut self) {
        for index in 0..self.level.slots.len() {
            let slot = &self.level.slots[index];
            if !slot.is_open {
                continue;
            }
            if slot.state != ScriptState::Inactive {
                log::debug!("open script {} already {}", slot.number, slot.state);
                continue;
            }
            let id = self.alloc_id();
            let entry = &self.level.image.entrypoints()[index];
            let mut inst = ScriptInstance::new(id, index, entry);
            inst.delay = self.config.open_script_delay;
            self.level.slots[index].state = ScriptState::Running;
            trace::sched(format_args!("open script {} started as {}", inst.number, id));
            self.instances.push(inst);
        }
    }

    /// Start (or resume) a script.
    ///
    /// `map` 0 means the current map; any other map that is not current
    /// queues a deferred start instead.
    pub fn start(
        &mut self,
        script: i32,
        map: u32,
        args: &[u8],
        activator: Option<ActorRef>,
        line: Option<LineRef>,
        side: u8,
    ) -> StartOutcome {
        if map != 0 && map != self.level.map {
            self.defer(map, script, args);
            return StartOutcome::Deferred;
        }

        let Some(index) = self.level.image.find(script) else {
            log::warn!("start: unknown script {}", script);
            return StartOutcome::UnknownScript;
        };

        match self.level.slots[index].state {
            ScriptState::Inactive => {}
            ScriptState::Suspended => {
                self.level.slots[index].state = ScriptState::Running;
                trace::sched(format_args!("script {} resumed", script));
                return StartOutcome::Resumed;
            }
            _ => return StartOutcome::AlreadyActive,
        }

        let id = self.alloc_id();
        let entry = &self.level.image.entrypoints()[index];
        let mut inst = ScriptInstance::new(id, index, entry);
        inst.set_args(args, entry.arg_count);
        inst.bind(activator, line, side);
        self.level.slots[index].state = ScriptState::Running;
        trace::sched(format_args!("script {} started as {}", script, id));
        self.instances.push(inst);
        StartOutcome::Started(id)
    }

    fn defer(&mut self, map: u32, script: i32, args: &[u8]) {
        if self.world.deferred.iter().any(|t| t.map == map && t.script == script) {
            log::debug!("script {} already deferred to map {}", script, map);
            return;
        }
        let mut task_args = [0u8; DEFERRED_ARGS];
        for (dst, src) in task_args.iter_mut().zip(args) {
            *dst = *src;
        }
        trace::sched(format_args!("script {} deferred to map {}", script, map));
        self.world.deferred.push(DeferredTask { map, script, args: task_args });
    }

    /// Ask a script to stop. Teardown happens on its next tick.
    pub fn terminate(&mut self, script: i32) -> bool {
        let Some(slot) = self.slot_mut(script) else {
            return false;
        };
        if matches!(slot.state, ScriptState::Inactive | ScriptState::Terminating) {
            return false;
        }
        slot.state = ScriptState::Terminating;
        trace::sched(format_args!("script {} terminating", script));
        true
    }

    pub fn suspend(&mut self, script: i32) -> bool {
        let Some(slot) = self.slot_mut(script) else {
            return false;
        };
        if matches!(slot.state, ScriptState::Inactive | ScriptState::Suspended | ScriptState::Terminating) {
            return false;
        }
        slot.state = ScriptState::Suspended;
        trace::sched(format_args!("script {} suspended", script));
        true
    }

    /// Start every deferred task aimed at `map`, which must be the loaded
    /// map. Returns how many instances were created.
    pub fn run_deferred_tasks<H: WorldHost + ?Sized>(&mut self, map: u32, host: &H) -> usize {
        if map != self.level.map {
            log::warn!("deferred tasks for map {} requested while map {} is loaded", map, self.level.map);
            return 0;
        }
        if host.game_type() == GameType::Deathmatch && !self.config.deferred_in_deathmatch {
            return 0;
        }

        let (ready, waiting): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.world.deferred).into_iter().partition(|t| t.map == map);
        self.world.deferred = waiting;

        let delay = self.config.deferred_start_delay;
        let mut started = 0;
        for task in ready {
            if let StartOutcome::Started(id) = self.start(task.script, 0, &task.args, None, None, 0) {
                if let Some(inst) = self.instance_mut(id) {
                    inst.delay = delay;
                }
                started += 1;
            }
        }
        started
    }

    /// A mover on `tag` finished. Scripts waiting on it resume unless another
    /// mover still runs there.
    pub fn notify_tag_finished<H: WorldHost + ?Sized>(&mut self, tag: i32, host: &H) {
        if host.tag_busy(tag) {
            return;
        }
        self.wake(ScriptState::WaitingForTag, tag);
    }

    pub fn notify_polyobj_finished<H: WorldHost + ?Sized>(&mut self, po: i32, host: &H) {
        if host.polyobj_busy(po) {
            return;
        }
        self.wake(ScriptState::WaitingForPolyobject, po);
    }

    fn wake(&mut self, waiting: ScriptState, value: i32) {
        for slot in self.level.slots.iter_mut() {
            if slot.state == waiting && slot.wait_value == value {
                slot.state = ScriptState::Running;
                trace::sched(format_args!("script {} woken ({} {})", slot.number, waiting, value));
            }
        }
    }

    /// Tear down the instance at `pos`: its script becomes inactive and every
    /// script waiting for it resumes.
    fn script_finished(&mut self, pos: usize) {
        let inst = self.instances.remove(pos);
        self.level.slots[inst.info_index].state = ScriptState::Inactive;
        trace::sched(format_args!("script {} finished ({})", inst.number, inst.id));
        self.wake(ScriptState::WaitingForScript, inst.number);
    }

    /// Run one tic of every live instance in start order.
    pub fn tick<H: WorldHost + ?Sized>(&mut self, host: &mut H) {
        let mut pos = 0;
        while pos < self.instances.len() {
            if self.run_at(pos, host) {
                pos += 1;
            }
        }
    }

    /// Run one tic of a single instance. Returns whether it is still alive.
    pub fn tick_instance<H: WorldHost + ?Sized>(&mut self, id: InstanceId, host: &mut H) -> bool {
        match self.position(id) {
            Some(pos) => self.run_at(pos, host),
            None => false,
        }
    }

    fn run_at<H: WorldHost + ?Sized>(&mut self, pos: usize, host: &mut H) -> bool {
        let index = self.instances[pos].info_index;
        match self.level.slots[index].state {
            ScriptState::Terminating => {
                self.script_finished(pos);
                return false;
            }
            ScriptState::Running => {}
            _ => return true,
        }

        let inst = &mut self.instances[pos];
        if inst.delay > 0 {
            inst.delay -= 1;
            return true;
        }

        let mut env = ExecEnv {
            image: &self.level.image,
            slots: &mut self.level.slots,
            map_vars: &mut self.level.map_vars,
            world_vars: &mut self.world.world_vars,
            print: &mut self.print,
            requests: &mut self.requests,
            host,
        };
        let outcome = inst.run_quantum(&mut env, self.config.instruction_budget);

        let alive = outcome != ExecOutcome::Terminate;
        if !alive {
            self.script_finished(pos);
        }
        self.drain_requests();
        alive
    }

    fn drain_requests(&mut self) {
        while let Some(request) = self.requests.pop() {
            self.apply(request);
        }
    }

    /// Carry out requests raised by line specials run outside a script.
    pub fn apply_requests(&mut self, requests: &mut ScriptRequests) {
        while let Some(request) = requests.pop() {
            self.apply(request);
        }
    }

    fn apply(&mut self, request: ScriptRequest) {
        match request {
            ScriptRequest::Start { script, map, args, activator, line, side } => {
                let outcome = self.start(script, map, &args, activator, line, side);
                if outcome != StartOutcome::Deferred && !outcome.took_effect() {
                    log::debug!("start request for script {} ignored ({:?})", script, outcome);
                }
            }
            ScriptRequest::Suspend { script } => {
                if !self.suspend(script) {
                    log::debug!("suspend request for script {} ignored", script);
                }
            }
            ScriptRequest::Terminate { script } => {
                if !self.terminate(script) {
                    log::debug!("terminate request for script {} ignored", script);
                }
            }
        }
    }

    fn position(&self, id: InstanceId) -> Option<usize> {
        self.instances.iter().position(|i| i.id == id)
    }

    fn slot_mut(&mut self, script: i32) -> Option<&mut ScriptSlot> {
        let index = self.level.image.find(script)?;
        self.level.slots.get_mut(index)
    }

    pub fn slot(&self, script: i32) -> Option<&ScriptSlot> {
        let index = self.level.image.find(script)?;
        self.level.slots.get(index)
    }

    pub fn slots(&self) -> &[ScriptSlot] {
        &self.level.slots
    }

    pub fn script_state(&self, script: i32) -> Option<ScriptState> {
        self.slot(script).map(|s| s.state)
    }

    pub fn instances(&self) -> &[ScriptInstance] {
        &self.instances
    }

    pub fn instance(&self, id: InstanceId) -> Option<&ScriptInstance> {
        self.instances.iter().find(|i| i.id == id)
    }

    pub fn instance_mut(&mut self, id: InstanceId) -> Option<&mut ScriptInstance> {
        self.instances.iter_mut().find(|i| i.id == id)
    }

    /// Instances currently running the given script.
    pub fn instances_of(&self, script: i32) -> impl Iterator<Item = &ScriptInstance> + '_ {
        self.instances.iter().filter(move |i| i.number == script)
    }

    pub fn map_vars(&self) -> &[i32; MAX_MAP_VARS] {
        &self.level.map_vars
    }

    pub fn map_vars_mut(&mut self) -> &mut [i32; MAX_MAP_VARS] {
        &mut self.level.map_vars
    }

    pub fn world_vars(&self) -> &[i32; MAX_WORLD_VARS] {
        &self.world.world_vars
    }

    pub fn world_vars_mut(&mut self) -> &mut [i32; MAX_WORLD_VARS] {
        &mut self.world.world_vars
    }

    pub fn deferred_tasks(&self) -> &[DeferredTask] {
        &self.world.deferred
    }

    pub fn print_buffer(&self) -> &str {
        self.print.as_str()
    }

    /// Listing of one script, or of every script when `script` is `None`.
    pub fn script_info(&self, script: Option<i32>) -> Vec<ScriptInfo> {
        self.level
            .slots
            .iter()
            .filter(|s| script.map_or(true, |n| s.number == n))
            .map(ScriptInfo::from)
            .collect()
    }
}
